//! Armature Animation
//!
//! Keyframe animation data and playback state:
//!
//! - **Keyframes** ([`keyframe`]): transform, numeric, morph and pose payloads
//! - **Tracks** ([`tracks`]): time-sorted keyframes per handle, with linear or
//!   spline interpolation and O(1) lookup through a shared [`TimeIndex`]
//! - **Animations** ([`Animation`]): named collections of tracks applied to
//!   nodes, numeric values or vertex data
//! - **States** ([`AnimationStateSet`]): per-object time, weight, looping and
//!   per-bone blend masks
//! - **Vertex animation** ([`MeshAnimations`], [`blend`]): poses, morph targets
//!   and their software or hardware application
//!
//! Skeleton-specific blending lives in `armature_skeleton`, which implements
//! [`NodeTargets`] for its bones.

pub mod animation;
pub mod blend;
pub mod keyframe;
pub mod mesh;
pub mod pose;
pub mod settings;
pub mod spline;
pub mod state;
pub mod time_index;
pub mod tracks;
pub mod values;

pub use animation::{
    AnimableTargets, Animation, AnimationContainer, BaseKeyFrames, NodeTargets,
    apply_pending_base_key_frames,
};
pub use keyframe::{
    KeyFrame, MorphSnapshot, NumericKeyFrame, PoseRef, TransformKeyFrame, VertexMorphKeyFrame,
    VertexPoseKeyFrame,
};
pub use mesh::MeshAnimations;
pub use pose::Pose;
pub use settings::{AnimationDefaults, InterpolationMode, RotationInterpolationMode, SkeletonBlendMode};
pub use state::{AnimationState, AnimationStateMut, AnimationStateSet, SharedAnimationStateSet};
pub use time_index::TimeIndex;
pub use tracks::numeric::AnimableScalar;
pub use tracks::{
    AnimableNode, AnimableValue, AnimationTrack, HardwareMorph, HardwarePoseSlot,
    HardwareVertexAnimation, KeyFrameSpan, KeyFrameTrack, NodeAnimationTrack, NumericAnimationTrack,
    TrackListener, VertexAnimationTarget, VertexAnimationTrack, VertexAnimationType, VertexTargetMode,
};
pub use tracks::node::NodeApplyMode;
