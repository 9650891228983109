#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! # Armature
//!
//! Skeletal animation, keyframe tracks, animation blending and vertex
//! skinning for real-time 3D.
//!
//! The engine is split into three crates, re-exported here:
//!
//! - [`armature_core`]: errors, quaternion math, vertex buffer views
//! - [`armature_animation`]: keyframes, tracks, animations, animation
//!   states, poses and morph targets
//! - [`armature_skeleton`]: bones, skeletons and skinning
//!
//! ```rust,ignore
//! use armature::prelude::*;
//!
//! let mut skeleton = Skeleton::new("hero");
//! skeleton.create_bone_named("root")?;
//! skeleton.set_binding_pose();
//!
//! let walk = skeleton.create_animation("walk", 1.0)?;
//! walk.create_node_track(0)?.create_node_key_frame(0.5).translate = Vec3::X;
//!
//! let mut states = AnimationStateSet::new();
//! skeleton.init_animation_state(&mut states)?;
//! states.state_mut("walk")?.set_enabled(true);
//!
//! states.state_mut("walk")?.add_time(0.25);
//! skeleton.set_animation_state(&states)?;
//! let palette = gpu_palette(&skeleton.bone_matrices());
//! ```

pub use armature_animation;
pub use armature_animation as animation;
pub use armature_core;
pub use armature_skeleton;
pub use armature_skeleton as skeleton;
pub use armature_skeleton::skinning;

pub use armature_core::errors::{ArmatureError, Result};

/// The types most programs need.
pub mod prelude {
    pub use armature_animation::{
        AnimableNode, AnimableScalar, AnimableTargets, AnimableValue, Animation, AnimationContainer,
        AnimationDefaults, AnimationState, AnimationStateSet, AnimationTrack, InterpolationMode, KeyFrame,
        MeshAnimations, NodeTargets, Pose, RotationInterpolationMode, SharedAnimationStateSet,
        SkeletonBlendMode, TransformKeyFrame, VertexAnimationTarget, VertexAnimationType,
    };
    pub use armature_core::{ArmatureError, BoneHandle, Result, VertexBuffer, VertexBufferMut, VertexLayout};
    pub use armature_skeleton::skinning::{
        BoneAssignmentList, VertexBoneAssignment, build_index_map, compile_bone_assignments, gpu_palette,
        prepare_matrices_for_vertex_blend, rationalise_bone_assignments, software_vertex_blend,
    };
    pub use armature_skeleton::{Bone, Skeleton};
    pub use glam::{Affine3A, Quat, Vec3};
}
