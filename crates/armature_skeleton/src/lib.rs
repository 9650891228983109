//! Armature Skeleton
//!
//! Bone hierarchies and what consumes them:
//!
//! - [`Bone`] / [`BoneArena`]: local, derived and binding-pose transforms with
//!   cached top-down propagation
//! - [`Skeleton`]: bones plus animations, linked animation sources, weighted
//!   blending of an [`AnimationStateSet`](armature_animation::AnimationStateSet)
//!   and animation merging between compatible skeletons
//! - [`skinning`]: bone assignments compiled to blend buffers and applied in
//!   software or handed to the GPU as a matrix palette

pub mod bone;
pub mod hierarchy;
pub mod merge;
pub mod skeleton;
pub mod skinning;

pub use bone::Bone;
pub use hierarchy::{BoneArena, LevelOrderBatches};
pub use skeleton::{LinkedSkeletonAnimationSource, Skeleton};
