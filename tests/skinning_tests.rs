//! Skinning Tests
//!
//! Tests for:
//! - Bone assignment rationalisation (weight bound and normalisation)
//! - Blend index maps and compiled blend buffers
//! - Software vertex blending driven by an animated skeleton
//! - GPU matrix palette layout
//! - Bone bounding radius

use glam::{Mat4, Quat, Vec3};

use armature::skinning::{
    BlendVertex, compute_bone_bounding_radius, palette_bytes, rationalise_bone_assignments,
};
use armature::prelude::*;

const EPSILON: f32 = 1e-5;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two stacked bones: root at the origin, child one unit up.
fn spine() -> Skeleton {
    let mut skeleton = Skeleton::new("spine");
    skeleton.create_bone_named("hips").unwrap();
    skeleton.create_child_bone(0, None, Vec3::Y, Quat::IDENTITY).unwrap();
    skeleton.set_binding_pose();
    skeleton
}

// ============================================================================
// Rationalisation
// ============================================================================

#[test]
fn rationalise_keeps_highest_weights() {
    init_logger();
    let mut assignments: BoneAssignmentList = [0.05, 0.3, 0.1, 0.25, 0.2, 0.1]
        .iter()
        .enumerate()
        .map(|(bone, &w)| VertexBoneAssignment::new(0, bone as u16, w))
        .collect();

    let report = rationalise_bone_assignments(1, &mut assignments);
    assert_eq!(report.max_bones_per_vertex, 4);

    let mut kept: Vec<u16> = assignments.for_vertex(0).iter().map(|a| a.bone_index).collect();
    kept.sort_unstable();
    // Bones 2 and 5 tie at 0.1; the earlier insertion is dropped first.
    assert_eq!(kept, vec![1, 3, 4, 5]);

    let total: f32 = assignments.for_vertex(0).iter().map(|a| a.weight).sum();
    assert!((total - 1.0).abs() < EPSILON);
}

#[test]
fn rationalise_flags_unskinned_vertices() {
    init_logger();
    let mut assignments: BoneAssignmentList = [VertexBoneAssignment::new(1, 0, 0.5)].into_iter().collect();
    let report = rationalise_bone_assignments(3, &mut assignments);
    assert_eq!(report.unskinned_vertices, 2);
    assert_eq!(report.pruned_vertices, 0);
    assert_eq!(assignments.for_vertex(1)[0].weight, 1.0);
}

// ============================================================================
// Skinning a Mesh
// ============================================================================

#[test]
fn animated_skeleton_deforms_vertices() -> anyhow::Result<()> {
    let mut skeleton = spine();
    let anim = skeleton.create_animation("bend", 1.0)?;
    let track = anim.create_node_track(1)?;
    for time in [0.0, 1.0] {
        track.create_node_key_frame(time).rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
    }

    let mut states = AnimationStateSet::new();
    skeleton.init_animation_state(&mut states)?;
    states.state_mut("bend")?.set_enabled(true);
    skeleton.set_animation_state(&states)?;

    // Vertex 0 rides the hips, vertex 1 sits above the child bone, vertex 2
    // is split between them.
    let mut assignments: BoneAssignmentList = [
        VertexBoneAssignment::new(0, 0, 1.0),
        VertexBoneAssignment::new(1, 1, 1.0),
        VertexBoneAssignment::new(2, 0, 0.5),
        VertexBoneAssignment::new(2, 1, 0.5),
    ]
    .into_iter()
    .collect();
    let report = rationalise_bone_assignments(3, &mut assignments);
    let map = build_index_map(&assignments)?;
    let blend = compile_bone_assignments(&assignments, 3, report.max_bones_per_vertex, &map)?;
    let matrices = prepare_matrices_for_vertex_blend(&skeleton.bone_matrices(), &map)?;

    let src_data: Vec<f32> = [Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, 0.0)]
        .iter()
        .flat_map(|p| p.to_array())
        .collect();
    let mut dst_data = vec![0.0; src_data.len()];
    let src = VertexBuffer::new(&src_data, VertexLayout::POSITION)?;
    let mut dst = VertexBufferMut::new(&mut dst_data, VertexLayout::POSITION)?;
    software_vertex_blend(&src, &mut dst, &blend, &matrices, false)?;

    assert!(vec3_approx(dst.position(0), Vec3::ZERO));
    // One unit above the child, rotated a quarter turn about +Z.
    assert!(vec3_approx(dst.position(1), Vec3::new(-1.0, 1.0, 0.0)), "got {}", dst.position(1));
    assert!(vec3_approx(dst.position(2), Vec3::new(-0.5, 1.5, 0.0)));
    Ok(())
}

#[test]
fn blend_buffer_layout_is_packed() {
    assert_eq!(std::mem::size_of::<BlendVertex>(), 20);
    let assignments: BoneAssignmentList = [VertexBoneAssignment::new(0, 3, 1.0)].into_iter().collect();
    let map = build_index_map(&assignments).unwrap();
    let blend = compile_bone_assignments(&assignments, 1, 1, &map).unwrap();
    let bytes = blend.as_bytes();
    assert_eq!(bytes.len(), 20);
    assert_eq!(bytes[0], 0);
    assert_eq!(bytemuck::pod_read_unaligned::<f32>(&bytes[4..8]), 1.0);
}

#[test]
fn gpu_palette_round_trips_through_bytes() {
    let mut skeleton = spine();
    skeleton.bone_mut(0).unwrap().translate(Vec3::new(0.0, 0.0, 3.0));
    let palette = gpu_palette(&skeleton.bone_matrices());
    let bytes = palette_bytes(&palette);
    assert_eq!(bytes.len(), 2 * 64);
    let restored: Vec<Mat4> = bytes.chunks_exact(64).map(bytemuck::pod_read_unaligned).collect();
    assert_eq!(restored, palette);
    assert!(vec3_approx(restored[1].w_axis.truncate(), Vec3::new(0.0, 0.0, 3.0)));
}

// ============================================================================
// Bounding Radius
// ============================================================================

#[test]
fn bone_bounding_radius_needs_binding_pose() {
    let mut unbound = Skeleton::new("raw");
    unbound.create_bone().unwrap();
    let data = [0.0, 2.0, 0.0];
    let positions = VertexBuffer::new(&data, VertexLayout::POSITION).unwrap();
    let assignments: BoneAssignmentList = [VertexBoneAssignment::new(0, 0, 1.0)].into_iter().collect();
    assert!(matches!(
        compute_bone_bounding_radius(&unbound, &positions, &assignments),
        Err(ArmatureError::InvalidState(_))
    ));

    let skeleton = spine();
    let radius = compute_bone_bounding_radius(&skeleton, &positions, &assignments).unwrap();
    assert!((radius - 2.0).abs() < EPSILON);
    let child: BoneAssignmentList = [VertexBoneAssignment::new(0, 1, 1.0)].into_iter().collect();
    let radius = compute_bone_bounding_radius(&skeleton, &positions, &child).unwrap();
    assert!((radius - 1.0).abs() < EPSILON);
}
