//! Vertex skinning: bone assignments, blend-index compilation and linear
//! blend skinning on the CPU.
//!
//! The usual flow for a skinned mesh:
//!
//! ```rust,ignore
//! let report = rationalise_bone_assignments(vertex_count, &mut assignments);
//! let map = build_index_map(&assignments)?;
//! let blend = compile_bone_assignments(&assignments, vertex_count, report.max_bones_per_vertex, &map)?;
//!
//! // Per frame
//! skeleton.set_animation_state(&states)?;
//! let matrices = prepare_matrices_for_vertex_blend(&skeleton.bone_matrices(), &map)?;
//! software_vertex_blend(&src, &mut dst, &blend, &matrices, true)?;
//! ```

pub mod assignment;
pub mod blend;

pub use assignment::{
    BlendBuffer, BlendIndexMap, BlendVertex, BoneAssignmentList, RationaliseReport, VertexBoneAssignment,
    build_index_map, compile_bone_assignments, rationalise_bone_assignments,
};
pub use blend::{
    compute_bone_bounding_radius, gpu_palette, palette_bytes, prepare_matrices_for_vertex_blend,
    software_vertex_blend,
};
