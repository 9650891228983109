//! Linear blend skinning on the CPU, plus the matrix palette for GPU skinning.

use glam::{Affine3A, Mat4, Vec3};

use armature_core::errors::{ArmatureError, Result};
use armature_core::{VertexBuffer, VertexBufferMut};

use crate::skeleton::Skeleton;
use crate::skinning::assignment::{BlendBuffer, BlendIndexMap, BoneAssignmentList};

/// Reorders bone matrices into blend-index order.
pub fn prepare_matrices_for_vertex_blend(bone_matrices: &[Affine3A], map: &BlendIndexMap) -> Result<Vec<Affine3A>> {
    map.blend_to_bone
        .iter()
        .map(|&bone| {
            bone_matrices.get(usize::from(bone)).copied().ok_or(ArmatureError::IndexOutOfBounds {
                context: "bone matrix",
                index: usize::from(bone),
            })
        })
        .collect()
}

/// Skins every vertex of `src` into `dst`.
///
/// Each output position is the weighted sum of the source position
/// transformed by each referenced blend matrix; zero weights are skipped.
/// With `blend_normals`, normals are blended through the matrices' linear
/// part and renormalised.
pub fn software_vertex_blend(
    src: &VertexBuffer<'_>,
    dst: &mut VertexBufferMut<'_>,
    blend: &BlendBuffer,
    blend_matrices: &[Affine3A],
    blend_normals: bool,
) -> Result<()> {
    let count = src.vertex_count();
    if dst.vertex_count() < count || blend.len() < count {
        return Err(ArmatureError::invalid_parameter(format!(
            "skinning {count} vertices needs as many destination vertices ({}) and blend entries ({})",
            dst.vertex_count(),
            blend.len()
        )));
    }
    let blend_normals = blend_normals && src.layout().has_normals() && dst.layout().has_normals();
    let weights = blend.weights_per_vertex();

    for (index, entry) in blend.vertices().iter().take(count).enumerate() {
        let position = src.position(index);
        let normal = if blend_normals { src.normal(index) } else { None };

        let mut acc_position = Vec3::ZERO;
        let mut acc_normal = Vec3::ZERO;
        for slot in 0..weights {
            let weight = entry.weights[slot];
            if weight == 0.0 {
                continue;
            }
            let blend_index = usize::from(entry.indices[slot]);
            let matrix = blend_matrices.get(blend_index).ok_or(ArmatureError::IndexOutOfBounds {
                context: "blend matrix",
                index: blend_index,
            })?;
            acc_position += matrix.transform_point3(position) * weight;
            if let Some(n) = normal {
                acc_normal += matrix.transform_vector3(n) * weight;
            }
        }

        dst.set_position(index, acc_position);
        if normal.is_some() {
            dst.set_normal(index, acc_normal.normalize_or_zero());
        }
    }
    Ok(())
}

/// Blend matrices as 4x4 column-major matrices for a GPU uniform or storage buffer.
#[must_use]
pub fn gpu_palette(blend_matrices: &[Affine3A]) -> Vec<Mat4> {
    blend_matrices.iter().map(|&m| Mat4::from(m)).collect()
}

#[must_use]
pub fn palette_bytes(palette: &[Mat4]) -> &[u8] {
    bytemuck::cast_slice(palette)
}

/// Largest distance from any assigned vertex to the binding-pose position
/// of a bone it is assigned to.
///
/// Requires the skeleton to have a binding pose.
pub fn compute_bone_bounding_radius(
    skeleton: &Skeleton,
    positions: &VertexBuffer<'_>,
    assignments: &BoneAssignmentList,
) -> Result<f32> {
    if !skeleton.has_binding_pose() {
        return Err(ArmatureError::invalid_state(format!(
            "skeleton '{}' has no binding pose",
            skeleton.name()
        )));
    }
    let mut radius = 0.0_f32;
    for a in assignments.iter() {
        if a.vertex_index >= positions.vertex_count() {
            return Err(ArmatureError::IndexOutOfBounds {
                context: "bone assignment vertex",
                index: a.vertex_index,
            });
        }
        let bone = skeleton.bone(a.bone_index)?;
        let distance = positions.position(a.vertex_index).distance(bone.binding_pose_position());
        radius = radius.max(distance);
    }
    Ok(radius)
}
