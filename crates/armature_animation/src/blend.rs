//! Software vertex morph and pose blending.

use std::collections::BTreeMap;

use glam::Vec3;

use armature_core::errors::{ArmatureError, Result};
use armature_core::vertex::VertexBufferMut;

use crate::keyframe::MorphSnapshot;

/// Writes `lerp(from, to, t)` into `dst` for every destination vertex.
///
/// Normals are interpolated and renormalised when both snapshots and the
/// destination carry them.
pub fn software_vertex_morph(t: f32, from: &MorphSnapshot, to: &MorphSnapshot, dst: &mut VertexBufferMut<'_>) -> Result<()> {
    let count = dst.vertex_count();
    if from.vertex_count() < count || to.vertex_count() < count {
        return Err(ArmatureError::invalid_parameter(format!(
            "morph snapshots hold {} and {} vertices, destination needs {count}",
            from.vertex_count(),
            to.vertex_count()
        )));
    }

    let morph_normals = from.includes_normals() && to.includes_normals() && dst.layout().has_normals();
    for i in 0..count {
        let p1 = from.position(i);
        let p2 = to.position(i);
        dst.set_position(i, p1 + (p2 - p1) * t);

        if morph_normals
            && let (Some(n1), Some(n2)) = (from.normal(i), to.normal(i))
        {
            dst.set_normal(i, (n1 + (n2 - n1) * t).normalize_or_zero());
        }
    }
    Ok(())
}

/// Adds `offset * weight` to each listed vertex (and normal, if any).
pub fn software_vertex_pose_blend(
    weight: f32,
    vertex_offsets: &BTreeMap<usize, Vec3>,
    normals: &BTreeMap<usize, Vec3>,
    dst: &mut VertexBufferMut<'_>,
) -> Result<()> {
    if weight == 0.0 {
        return Ok(());
    }
    let count = dst.vertex_count();
    if let Some((&last, _)) = vertex_offsets.last_key_value()
        && last >= count
    {
        return Err(ArmatureError::IndexOutOfBounds {
            context: "pose vertex",
            index: last,
        });
    }

    for (&index, &offset) in vertex_offsets {
        let position = dst.position(index);
        dst.set_position(index, position + offset * weight);
    }

    if dst.layout().has_normals() {
        for (&index, &offset) in normals.range(..count) {
            if let Some(normal) = dst.normal(index) {
                dst.set_normal(index, normal + offset * weight);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature_core::vertex::VertexLayout;

    #[test]
    fn morph_halfway() {
        let from = MorphSnapshot::from_positions(&[Vec3::ZERO, Vec3::X]);
        let to = MorphSnapshot::from_positions(&[Vec3::Y * 2.0, Vec3::X * 3.0]);
        let mut data = vec![0.0; 6];
        let mut dst = VertexBufferMut::new(&mut data, VertexLayout::POSITION).unwrap();
        software_vertex_morph(0.5, &from, &to, &mut dst).unwrap();
        assert_eq!(dst.position(0), Vec3::Y);
        assert_eq!(dst.position(1), Vec3::X * 2.0);
    }

    #[test]
    fn morph_rejects_short_snapshots() {
        let from = MorphSnapshot::from_positions(&[Vec3::ZERO]);
        let mut data = vec![0.0; 6];
        let mut dst = VertexBufferMut::new(&mut data, VertexLayout::POSITION).unwrap();
        assert!(software_vertex_morph(0.5, &from, &from, &mut dst).is_err());
    }

    #[test]
    fn pose_blend_zero_weight_is_noop() {
        let offsets = BTreeMap::from([(5, Vec3::ONE)]);
        let mut data = vec![0.0; 3];
        let mut dst = VertexBufferMut::new(&mut data, VertexLayout::POSITION).unwrap();
        // Out of range index is ignored when nothing would be written.
        software_vertex_pose_blend(0.0, &offsets, &BTreeMap::new(), &mut dst).unwrap();
        assert!(software_vertex_pose_blend(1.0, &offsets, &BTreeMap::new(), &mut dst).is_err());
    }
}
