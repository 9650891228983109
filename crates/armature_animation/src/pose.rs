//! Poses: sparse per-vertex offsets blended additively by pose keyframes.

use std::collections::BTreeMap;

use glam::Vec3;

use armature_core::errors::{ArmatureError, Result};

// Offsets shorter than this are not stored.
const MIN_OFFSET_SQUARED: f32 = 1e-6;

/// A named set of vertex position (and optionally normal) offsets for one
/// vertex target.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    name: String,
    target: u16,
    vertex_offsets: BTreeMap<usize, Vec3>,
    normals: BTreeMap<usize, Vec3>,
}

impl Pose {
    #[must_use]
    pub fn new(target: u16, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target,
            vertex_offsets: BTreeMap::new(),
            normals: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The vertex target this pose deforms.
    #[inline]
    #[must_use]
    pub fn target(&self) -> u16 {
        self.target
    }

    /// Adds a position-only offset. A pose either carries normals for every
    /// vertex or for none.
    pub fn add_vertex(&mut self, index: usize, offset: Vec3) -> Result<()> {
        if !self.normals.is_empty() {
            return Err(ArmatureError::invalid_parameter(format!(
                "pose '{}' stores normals; every vertex needs a normal offset",
                self.name
            )));
        }
        if offset.length_squared() >= MIN_OFFSET_SQUARED {
            self.vertex_offsets.insert(index, offset);
        }
        Ok(())
    }

    pub fn add_vertex_with_normal(&mut self, index: usize, offset: Vec3, normal: Vec3) -> Result<()> {
        if self.vertex_offsets.len() > self.normals.len() {
            return Err(ArmatureError::invalid_parameter(format!(
                "pose '{}' stores positions only; normal offsets cannot be mixed in",
                self.name
            )));
        }
        if offset.length_squared() >= MIN_OFFSET_SQUARED || normal.length_squared() >= MIN_OFFSET_SQUARED {
            self.vertex_offsets.insert(index, offset);
            self.normals.insert(index, normal);
        }
        Ok(())
    }

    pub fn remove_vertex(&mut self, index: usize) {
        self.vertex_offsets.remove(&index);
        self.normals.remove(&index);
    }

    pub fn clear_vertices(&mut self) {
        self.vertex_offsets.clear();
        self.normals.clear();
    }

    #[must_use]
    pub fn vertex_offsets(&self) -> &BTreeMap<usize, Vec3> {
        &self.vertex_offsets
    }

    #[must_use]
    pub fn normals(&self) -> &BTreeMap<usize, Vec3> {
        &self.normals
    }

    #[must_use]
    pub fn includes_normals(&self) -> bool {
        !self.normals.is_empty()
    }
}
