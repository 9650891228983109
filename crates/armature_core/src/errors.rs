//! Error Types
//!
//! This module defines the error type shared by every Armature crate.
//!
//! # Overview
//!
//! [`ArmatureError`] covers the failure modes of the animation runtime:
//! - Lookups of bones, animations, tracks, states and poses that do not exist
//! - Duplicate names or handles on creation
//! - Out-of-range handles and malformed input
//! - Operations attempted before a required precondition (such as a binding pose)
//!
//! Advisory conditions (pruned bone assignments, unskinned vertices, unresolved
//! linked skeletons) are not errors; they are reported through the `log` facade.
//!
//! # Usage
//!
//! ```rust,ignore
//! use armature_core::errors::{ArmatureError, Result};
//!
//! fn find_bone(name: &str) -> Result<u16> {
//!     Err(ArmatureError::not_found("bone", name))
//! }
//! ```

use thiserror::Error;

/// The error type for Armature operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArmatureError {
    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// A named or handled item does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What kind of item was requested (bone, animation, track, ...)
        kind: &'static str,
        /// The requested name or handle
        name: String,
    },

    /// An item with the same name or handle already exists.
    #[error("{kind} already exists: {name}")]
    Duplicate {
        /// What kind of item was being created
        kind: &'static str,
        /// The conflicting name or handle
        name: String,
    },

    // ========================================================================
    // Argument Errors
    // ========================================================================
    /// A parameter is out of its valid range or otherwise malformed.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Positional access beyond the end of a collection.
    #[error("Index out of bounds: {context} (index: {index})")]
    IndexOutOfBounds {
        /// Description of what was being accessed
        context: &'static str,
        /// The invalid index
        index: usize,
    },

    // ========================================================================
    // State Errors
    // ========================================================================
    /// The operation requires a precondition that has not been established.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ArmatureError {
    /// Shorthand for [`ArmatureError::NotFound`].
    pub fn not_found(kind: &'static str, name: impl ToString) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Shorthand for [`ArmatureError::Duplicate`].
    pub fn duplicate(kind: &'static str, name: impl ToString) -> Self {
        Self::Duplicate {
            kind,
            name: name.to_string(),
        }
    }

    /// Shorthand for [`ArmatureError::InvalidParameter`].
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Shorthand for [`ArmatureError::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

/// Alias for `Result<T, ArmatureError>`.
pub type Result<T> = std::result::Result<T, ArmatureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_item() {
        let err = ArmatureError::not_found("animation", "walk");
        assert_eq!(err.to_string(), "animation not found: walk");

        let err = ArmatureError::duplicate("bone", 3);
        assert_eq!(err.to_string(), "bone already exists: 3");

        let err = ArmatureError::IndexOutOfBounds {
            context: "key frame",
            index: 7,
        };
        assert_eq!(err.to_string(), "Index out of bounds: key frame (index: 7)");
    }
}
