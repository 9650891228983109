//! Vertex-to-bone assignments and their compilation into blend buffers.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use smallvec::SmallVec;

use armature_core::errors::{ArmatureError, Result};
use armature_core::{BoneHandle, MAX_BLEND_WEIGHTS};

/// One bone influencing one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexBoneAssignment {
    pub vertex_index: usize,
    pub bone_index: BoneHandle,
    pub weight: f32,
}

impl VertexBoneAssignment {
    #[must_use]
    pub fn new(vertex_index: usize, bone_index: BoneHandle, weight: f32) -> Self {
        Self {
            vertex_index,
            bone_index,
            weight,
        }
    }
}

/// Bone assignments grouped by vertex, in insertion order within a vertex.
#[derive(Debug, Clone, Default)]
pub struct BoneAssignmentList {
    by_vertex: BTreeMap<usize, SmallVec<[VertexBoneAssignment; MAX_BLEND_WEIGHTS]>>,
}

impl BoneAssignmentList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, assignment: VertexBoneAssignment) {
        self.by_vertex.entry(assignment.vertex_index).or_default().push(assignment);
    }

    pub fn clear(&mut self) {
        self.by_vertex.clear();
    }

    /// Total number of assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_vertex.values().map(SmallVec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_vertex.is_empty()
    }

    #[must_use]
    pub fn for_vertex(&self, vertex_index: usize) -> &[VertexBoneAssignment] {
        self.by_vertex.get(&vertex_index).map(|list| list.as_slice()).unwrap_or_default()
    }

    /// Every assignment, ordered by vertex.
    pub fn iter(&self) -> impl Iterator<Item = &VertexBoneAssignment> {
        self.by_vertex.values().flatten()
    }
}

impl FromIterator<VertexBoneAssignment> for BoneAssignmentList {
    fn from_iter<I: IntoIterator<Item = VertexBoneAssignment>>(iter: I) -> Self {
        let mut list = Self::new();
        for assignment in iter {
            list.add(assignment);
        }
        list
    }
}

/// What [`rationalise_bone_assignments`] found and changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RationaliseReport {
    /// Largest per-vertex assignment count after pruning.
    pub max_bones_per_vertex: usize,
    /// Vertices that lost their lowest-weighted assignments.
    pub pruned_vertices: usize,
    /// Vertices below `vertex_count` with no assignment, or whose
    /// assignments weigh nothing in total.
    pub unskinned_vertices: usize,
}

/// Caps every vertex at [`MAX_BLEND_WEIGHTS`] assignments, dropping the
/// lowest weights while keeping the survivors in insertion order, and normalises each vertex's weights to sum to one.
///
/// Pruning and unskinned vertices are reported and logged as warnings.
pub fn rationalise_bone_assignments(vertex_count: usize, assignments: &mut BoneAssignmentList) -> RationaliseReport {
    let mut report = RationaliseReport::default();

    for vertex in 0..vertex_count {
        let Some(list) = assignments.by_vertex.get_mut(&vertex) else {
            report.unskinned_vertices += 1;
            continue;
        };
        if list.is_empty() {
            report.unskinned_vertices += 1;
            continue;
        }

        if list.len() > MAX_BLEND_WEIGHTS {
            // Among equal weights the earlier assignment goes first.
            let mut by_weight: SmallVec<[usize; 8]> = (0..list.len()).collect();
            by_weight.sort_by(|&a, &b| list[a].weight.total_cmp(&list[b].weight));
            let doomed = &by_weight[..list.len() - MAX_BLEND_WEIGHTS];
            let mut index = 0;
            list.retain(|_| {
                let keep = !doomed.contains(&index);
                index += 1;
                keep
            });
            report.pruned_vertices += 1;
        }
        report.max_bones_per_vertex = report.max_bones_per_vertex.max(list.len());

        let total: f32 = list.iter().map(|a| a.weight).sum();
        if total == 0.0 {
            log::warn!("Vertex {vertex} has bone assignments with zero total weight");
            report.unskinned_vertices += 1;
        } else if (total - 1.0).abs() > f32::EPSILON {
            for a in list.iter_mut() {
                a.weight /= total;
            }
        }
    }

    if report.pruned_vertices > 0 {
        log::warn!(
            "{} vertices had more than {MAX_BLEND_WEIGHTS} bone assignments; the lowest weighted ones were removed, so animation may look slightly different",
            report.pruned_vertices
        );
    }
    if report.unskinned_vertices > 0 {
        log::warn!(
            "{} vertices have no bone assignment and will not follow skeletal animation",
            report.unskinned_vertices
        );
    }
    report
}

/// Bijection between the bones a mesh actually uses and compact blend indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlendIndexMap {
    /// Bone handle for each blend index.
    pub blend_to_bone: Vec<BoneHandle>,
    /// Blend index for each bone handle up to the highest used one.
    /// Entries for unused bones are meaningless.
    pub bone_to_blend: Vec<u16>,
}

impl BlendIndexMap {
    /// Blend index for `bone`, if the bone is used.
    #[must_use]
    pub fn blend_index(&self, bone: BoneHandle) -> Option<u16> {
        let blend = *self.bone_to_blend.get(usize::from(bone))?;
        (self.blend_to_bone.get(usize::from(blend)) == Some(&bone)).then_some(blend)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blend_to_bone.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blend_to_bone.is_empty()
    }
}

/// Numbers the distinct bones used by `assignments` in ascending handle order.
///
/// Blend indices are stored as bytes, so more than 256 distinct bones is an
/// error.
pub fn build_index_map(assignments: &BoneAssignmentList) -> Result<BlendIndexMap> {
    let mut used: Vec<BoneHandle> = assignments.iter().map(|a| a.bone_index).collect();
    used.sort_unstable();
    used.dedup();

    if used.len() > usize::from(u8::MAX) + 1 {
        return Err(ArmatureError::invalid_parameter(format!(
            "{} distinct bones are referenced, but blend indices address at most 256",
            used.len()
        )));
    }
    let Some(&highest) = used.last() else {
        return Ok(BlendIndexMap::default());
    };

    let mut bone_to_blend = vec![0; usize::from(highest) + 1];
    for (blend, &bone) in used.iter().enumerate() {
        bone_to_blend[usize::from(bone)] = blend as u16;
    }
    Ok(BlendIndexMap {
        blend_to_bone: used,
        bone_to_blend,
    })
}

/// Per-vertex blend indices and weights, laid out for upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct BlendVertex {
    pub indices: [u8; MAX_BLEND_WEIGHTS],
    pub weights: [f32; MAX_BLEND_WEIGHTS],
}

/// Compiled blend data for a whole vertex buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendBuffer {
    weights_per_vertex: usize,
    vertices: Vec<BlendVertex>,
}

impl BlendBuffer {
    /// How many of the [`MAX_BLEND_WEIGHTS`] slots per vertex are meaningful.
    #[must_use]
    pub fn weights_per_vertex(&self) -> usize {
        self.weights_per_vertex
    }

    #[must_use]
    pub fn vertices(&self) -> &[BlendVertex] {
        &self.vertices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Raw bytes, ready for a GPU vertex buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Writes up to `weights_per_vertex` (index, weight) pairs per vertex, with
/// bone handles translated through `map`.
///
/// Unused slots get weight zero. A vertex with no assignment at all is bound
/// fully to blend index 0, and one whose weights sum to zero fully to its
/// first assigned bone, so neither is collapsed to the origin.
pub fn compile_bone_assignments(
    assignments: &BoneAssignmentList,
    vertex_count: usize,
    weights_per_vertex: usize,
    map: &BlendIndexMap,
) -> Result<BlendBuffer> {
    if !(1..=MAX_BLEND_WEIGHTS).contains(&weights_per_vertex) {
        return Err(ArmatureError::invalid_parameter(format!(
            "weights per vertex must be between 1 and {MAX_BLEND_WEIGHTS}, got {weights_per_vertex}"
        )));
    }

    let mut vertices = vec![BlendVertex::default(); vertex_count];
    for (vertex, out) in vertices.iter_mut().enumerate() {
        let list = assignments.for_vertex(vertex);
        if list.is_empty() {
            out.weights[0] = 1.0;
            continue;
        }
        let weightless = list.iter().all(|a| a.weight == 0.0);
        for (slot, a) in list.iter().take(weights_per_vertex).enumerate() {
            let blend = map.blend_index(a.bone_index).ok_or_else(|| {
                ArmatureError::invalid_parameter(format!("bone {} is missing from the blend index map", a.bone_index))
            })?;
            out.indices[slot] = blend as u8;
            out.weights[slot] = a.weight;
        }
        if weightless {
            out.weights[0] = 1.0;
        }
    }
    Ok(BlendBuffer {
        weights_per_vertex,
        vertices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(v: usize, bone: u16, w: f32) -> VertexBoneAssignment {
        VertexBoneAssignment::new(v, bone, w)
    }

    #[test]
    fn rationalise_prunes_and_normalises() {
        let mut list: BoneAssignmentList = [
            assign(0, 0, 0.1),
            assign(0, 1, 0.4),
            assign(0, 2, 0.2),
            assign(0, 3, 0.2),
            assign(0, 4, 0.1),
            assign(1, 0, 2.0),
        ]
        .into_iter()
        .collect();

        let report = rationalise_bone_assignments(3, &mut list);
        assert_eq!(report.max_bones_per_vertex, 4);
        assert_eq!(report.pruned_vertices, 1);
        assert_eq!(report.unskinned_vertices, 1);

        let v0 = list.for_vertex(0);
        assert_eq!(v0.len(), 4);
        let total: f32 = v0.iter().map(|a| a.weight).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(v0[0].bone_index, 1);
        assert_eq!(list.for_vertex(1)[0].weight, 1.0);
    }

    #[test]
    fn index_map_is_ascending_and_compact() {
        let list: BoneAssignmentList = [assign(0, 7, 1.0), assign(1, 2, 0.5), assign(1, 7, 0.5)].into_iter().collect();
        let map = build_index_map(&list).unwrap();
        assert_eq!(map.blend_to_bone, vec![2, 7]);
        assert_eq!(map.bone_to_blend.len(), 8);
        assert_eq!(map.blend_index(7), Some(1));
        assert_eq!(map.blend_index(3), None);
    }

    #[test]
    fn index_map_rejects_too_many_bones() {
        let list: BoneAssignmentList = (0..257u16).map(|b| assign(usize::from(b), b, 1.0)).collect();
        assert!(build_index_map(&list).is_err());
        assert!(build_index_map(&BoneAssignmentList::new()).unwrap().is_empty());
    }

    #[test]
    fn compile_fills_slots_and_unskinned_vertices() {
        let list: BoneAssignmentList = [assign(0, 5, 0.75), assign(0, 9, 0.25)].into_iter().collect();
        let map = build_index_map(&list).unwrap();
        let buffer = compile_bone_assignments(&list, 2, 2, &map).unwrap();
        assert_eq!(buffer.vertices()[0].indices[..2], [0, 1]);
        assert_eq!(buffer.vertices()[0].weights[..2], [0.75, 0.25]);
        assert_eq!(buffer.vertices()[1].weights[0], 1.0);
        assert_eq!(buffer.as_bytes().len(), 2 * std::mem::size_of::<BlendVertex>());
        assert!(compile_bone_assignments(&list, 2, 0, &map).is_err());
    }

    #[test]
    fn weightless_vertex_is_flagged_and_bound_to_its_first_bone() {
        let mut list: BoneAssignmentList = [assign(0, 3, 1.0), assign(1, 6, 0.0), assign(1, 3, 0.0)]
            .into_iter()
            .collect();
        let report = rationalise_bone_assignments(2, &mut list);
        assert_eq!(report.unskinned_vertices, 1);

        let map = build_index_map(&list).unwrap();
        let buffer = compile_bone_assignments(&list, 2, 2, &map).unwrap();
        let v1 = buffer.vertices()[1];
        assert_eq!(v1.indices[0], map.blend_index(6).unwrap() as u8);
        assert_eq!(v1.weights[..2], [1.0, 0.0]);
    }
}
