//! Armature Core
//!
//! Foundational types shared by every Armature crate:
//!
//! - [`errors`]: the [`ArmatureError`] taxonomy and [`Result`] alias
//! - [`math`]: quaternion interpolation and tolerance helpers
//! - [`vertex`]: strided views over interleaved vertex buffers
//!
//! Hard limits of the animation runtime are defined here as constants.

pub mod errors;
pub mod math;
pub mod vertex;

pub use errors::{ArmatureError, Result};
pub use vertex::{VertexBuffer, VertexBufferMut, VertexLayout};

/// Maximum number of bones in one skeleton. Bone handles are `0..MAX_NUM_BONES`.
pub const MAX_NUM_BONES: usize = 256;

/// Maximum number of bone influences kept per vertex.
pub const MAX_BLEND_WEIGHTS: usize = 4;

/// Handle of a bone inside its skeleton; doubles as the node-track handle.
pub type BoneHandle = u16;
