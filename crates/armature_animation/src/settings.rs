//! Animation Settings
//!
//! Per-container defaults stamped onto every [`Animation`](crate::Animation)
//! a container creates.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use armature_animation::{AnimationDefaults, InterpolationMode};
//!
//! let defaults = AnimationDefaults {
//!     interpolation: InterpolationMode::Spline,
//!     ..Default::default()
//! };
//! skeleton.set_animation_defaults(defaults);
//! let walk = skeleton.create_animation("walk", 2.0)?;
//! assert_eq!(walk.interpolation_mode(), InterpolationMode::Spline);
//! ```

/// How positions, scales and numeric values are interpolated between keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationMode {
    /// Straight-line interpolation.
    #[default]
    Linear,
    /// Hermite spline through the keyframes with Catmull-Rom tangents.
    Spline,
}

/// How rotations are interpolated in [`InterpolationMode::Linear`] and how
/// partial weights are applied to rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationInterpolationMode {
    /// Normalised linear interpolation. Cheaper, not constant-velocity.
    #[default]
    Linear,
    /// Spherical linear interpolation.
    Spherical,
}

/// Interpolation defaults used when a container creates a new animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimationDefaults {
    /// Interpolation mode of new animations.
    ///
    /// Default: [`InterpolationMode::Linear`]
    pub interpolation: InterpolationMode,

    /// Rotation interpolation mode of new animations.
    ///
    /// Default: [`RotationInterpolationMode::Linear`]
    pub rotation_interpolation: RotationInterpolationMode,
}

/// How a skeleton combines several enabled animation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonBlendMode {
    /// Weights summing past 1.0 are rescaled to sum to 1.0; scales multiply.
    #[default]
    Average,
    /// Weights are used as given; scale contributions add up.
    Cumulative,
}
