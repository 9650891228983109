//! Keyframe families.
//!
//! A keyframe pairs a time with a payload. The time is fixed at creation so a
//! track's list stays sorted; the payload is freely editable.

use std::sync::Arc;

use glam::{Quat, Vec3};
use smallvec::SmallVec;

/// Common behaviour of every keyframe family.
pub trait KeyFrame: Clone + std::fmt::Debug {
    /// A keyframe at `time` carrying the family's neutral payload.
    fn at_time(time: f32) -> Self;

    fn time(&self) -> f32;

    /// Copy of this keyframe moved to `time`.
    #[must_use]
    fn retimed(&self, time: f32) -> Self;
}

// ============================================================================
// Transform
// ============================================================================

/// A node pose delta: translation, rotation and scale relative to the bind pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformKeyFrame {
    time: f32,
    pub translate: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl TransformKeyFrame {
    #[must_use]
    pub fn new(time: f32, translate: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            time,
            translate,
            rotation,
            scale,
        }
    }
}

impl KeyFrame for TransformKeyFrame {
    fn at_time(time: f32) -> Self {
        Self::new(time, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
    }

    #[inline]
    fn time(&self) -> f32 {
        self.time
    }

    fn retimed(&self, time: f32) -> Self {
        Self { time, ..*self }
    }
}

// ============================================================================
// Numeric
// ============================================================================

/// A single scalar value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericKeyFrame {
    time: f32,
    pub value: f32,
}

impl NumericKeyFrame {
    #[must_use]
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

impl KeyFrame for NumericKeyFrame {
    fn at_time(time: f32) -> Self {
        Self::new(time, 0.0)
    }

    #[inline]
    fn time(&self) -> f32 {
        self.time
    }

    fn retimed(&self, time: f32) -> Self {
        Self { time, ..*self }
    }
}

// ============================================================================
// Vertex morph
// ============================================================================

/// A full snapshot of vertex positions (and optionally normals), tightly
/// packed as `xyz` or `xyz nx ny nz` per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphSnapshot {
    data: Vec<f32>,
    includes_normals: bool,
}

impl MorphSnapshot {
    #[must_use]
    pub fn from_positions(positions: &[Vec3]) -> Self {
        Self {
            data: positions.iter().flat_map(|p| p.to_array()).collect(),
            includes_normals: false,
        }
    }

    /// Builds a snapshot from matching position and normal arrays. Extra
    /// entries in the longer array are ignored.
    #[must_use]
    pub fn from_positions_and_normals(positions: &[Vec3], normals: &[Vec3]) -> Self {
        let mut data = Vec::with_capacity(positions.len().min(normals.len()) * 6);
        for (p, n) in positions.iter().zip(normals) {
            data.extend_from_slice(&p.to_array());
            data.extend_from_slice(&n.to_array());
        }
        Self {
            data,
            includes_normals: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn includes_normals(&self) -> bool {
        self.includes_normals
    }

    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        if self.includes_normals { 6 } else { 3 }
    }

    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.stride()
    }

    #[must_use]
    pub fn position(&self, index: usize) -> Vec3 {
        let at = index * self.stride();
        Vec3::new(self.data[at], self.data[at + 1], self.data[at + 2])
    }

    #[must_use]
    pub fn normal(&self, index: usize) -> Option<Vec3> {
        self.includes_normals.then(|| {
            let at = index * 6 + 3;
            Vec3::new(self.data[at], self.data[at + 1], self.data[at + 2])
        })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// A morph keyframe referencing a shared vertex snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexMorphKeyFrame {
    time: f32,
    pub buffer: Option<Arc<MorphSnapshot>>,
}

impl VertexMorphKeyFrame {
    #[must_use]
    pub fn new(time: f32, buffer: Arc<MorphSnapshot>) -> Self {
        Self {
            time,
            buffer: Some(buffer),
        }
    }
}

impl KeyFrame for VertexMorphKeyFrame {
    fn at_time(time: f32) -> Self {
        Self { time, buffer: None }
    }

    #[inline]
    fn time(&self) -> f32 {
        self.time
    }

    fn retimed(&self, time: f32) -> Self {
        Self {
            time,
            buffer: self.buffer.clone(),
        }
    }
}

// ============================================================================
// Vertex pose
// ============================================================================

/// Influence of one pose (by index in the owning container's pose list).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseRef {
    pub pose_index: u16,
    pub influence: f32,
}

/// A set of weighted pose references.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexPoseKeyFrame {
    time: f32,
    pose_refs: SmallVec<[PoseRef; 4]>,
}

impl VertexPoseKeyFrame {
    #[must_use]
    pub fn pose_references(&self) -> &[PoseRef] {
        &self.pose_refs
    }

    pub fn add_pose_reference(&mut self, pose_index: u16, influence: f32) {
        self.pose_refs.push(PoseRef {
            pose_index,
            influence,
        });
    }

    /// Updates the influence of an existing reference, adding it if absent.
    pub fn update_pose_reference(&mut self, pose_index: u16, influence: f32) {
        match self.pose_refs.iter_mut().find(|r| r.pose_index == pose_index) {
            Some(existing) => existing.influence = influence,
            None => self.add_pose_reference(pose_index, influence),
        }
    }

    pub fn remove_pose_reference(&mut self, pose_index: u16) {
        self.pose_refs.retain(|r| r.pose_index != pose_index);
    }

    pub fn remove_all_pose_references(&mut self) {
        self.pose_refs.clear();
    }

    #[must_use]
    pub fn influence_of(&self, pose_index: u16) -> Option<f32> {
        self.pose_refs
            .iter()
            .find(|r| r.pose_index == pose_index)
            .map(|r| r.influence)
    }

    /// Subtracts the influences `base` holds for matching poses.
    pub fn rebase(&mut self, base: &VertexPoseKeyFrame) {
        for pose_ref in &mut self.pose_refs {
            pose_ref.influence -= base.influence_of(pose_ref.pose_index).unwrap_or(0.0);
        }
    }
}

impl KeyFrame for VertexPoseKeyFrame {
    fn at_time(time: f32) -> Self {
        Self {
            time,
            pose_refs: SmallVec::new(),
        }
    }

    #[inline]
    fn time(&self) -> f32 {
        self.time
    }

    fn retimed(&self, time: f32) -> Self {
        Self {
            time,
            pose_refs: self.pose_refs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_pose_reference_adds_or_replaces() {
        let mut kf = VertexPoseKeyFrame::at_time(0.0);
        kf.update_pose_reference(2, 0.5);
        kf.update_pose_reference(2, 0.75);
        kf.update_pose_reference(4, 1.0);
        assert_eq!(kf.pose_references().len(), 2);
        assert_eq!(kf.influence_of(2), Some(0.75));

        kf.remove_pose_reference(2);
        assert_eq!(kf.influence_of(2), None);
    }

    #[test]
    fn rebase_subtracts_matching_influences() {
        let mut kf = VertexPoseKeyFrame::at_time(1.0);
        kf.add_pose_reference(0, 1.0);
        kf.add_pose_reference(1, 0.5);
        let mut base = VertexPoseKeyFrame::at_time(0.0);
        base.add_pose_reference(0, 0.25);

        kf.rebase(&base);
        assert_eq!(kf.influence_of(0), Some(0.75));
        assert_eq!(kf.influence_of(1), Some(0.5));
    }

    #[test]
    fn morph_snapshot_layout() {
        let snapshot = MorphSnapshot::from_positions_and_normals(&[Vec3::X, Vec3::Y], &[Vec3::Z, Vec3::Z]);
        assert_eq!(snapshot.vertex_count(), 2);
        assert_eq!(snapshot.position(1), Vec3::Y);
        assert_eq!(snapshot.normal(0), Some(Vec3::Z));
    }
}
