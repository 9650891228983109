//! Benchmarks for skeleton posing and software skinning.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use armature::prelude::*;

/// A chain of `bones` bones, each one unit above its parent, with a looping
/// sway animation on every bone.
fn build_chain(bones: u16) -> (Skeleton, AnimationStateSet) {
    let mut skeleton = Skeleton::new("chain");
    skeleton.create_bone().unwrap();
    for handle in 1..bones {
        skeleton
            .create_child_bone(handle - 1, Some(handle), Vec3::Y, Quat::IDENTITY)
            .unwrap();
    }
    skeleton.set_binding_pose();

    let anim = skeleton.create_animation("sway", 2.0).unwrap();
    for handle in 0..bones {
        let track = anim.create_node_track(handle).unwrap();
        for (i, time) in [0.0, 0.5, 1.0, 1.5, 2.0].into_iter().enumerate() {
            let angle = if i % 2 == 0 { 0.0 } else { 0.2 };
            track.create_node_key_frame(time).rotation = Quat::from_rotation_z(angle);
        }
    }

    let mut states = AnimationStateSet::new();
    skeleton.init_animation_state(&mut states).unwrap();
    states.state_mut("sway").unwrap().set_enabled(true);
    (skeleton, states)
}

fn bench_set_animation_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_animation_state");
    for bones in [16_u16, 64, 256] {
        let (mut skeleton, mut states) = build_chain(bones);
        group.bench_with_input(BenchmarkId::from_parameter(bones), &bones, |b, _| {
            b.iter(|| {
                states.state_mut("sway").unwrap().add_time(1.0 / 60.0);
                skeleton.set_animation_state(black_box(&states)).unwrap();
                black_box(skeleton.bone_matrices())
            });
        });
    }
    group.finish();
}

fn bench_rationalise(c: &mut Criterion) {
    let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Error).try_init();

    let vertex_count = 10_000;
    let mut source = BoneAssignmentList::new();
    for v in 0..vertex_count {
        for slot in 0..6_u16 {
            let bone = (v as u16 + slot * 7) % 64;
            source.add(VertexBoneAssignment::new(v, bone, 0.1 + f32::from(slot) * 0.05));
        }
    }

    c.bench_function("rationalise_10k_six_way", |b| {
        b.iter(|| {
            let mut assignments = source.clone();
            black_box(rationalise_bone_assignments(vertex_count, &mut assignments))
        });
    });
}

fn bench_software_blend(c: &mut Criterion) {
    let (mut skeleton, states) = build_chain(64);
    skeleton.set_animation_state(&states).unwrap();

    let vertex_count = 10_000;
    let mut assignments = BoneAssignmentList::new();
    let mut src_data = Vec::with_capacity(vertex_count * 6);
    for v in 0..vertex_count {
        let height = (v % 640) as f32 / 10.0;
        src_data.extend_from_slice(&[0.5, height, 0.0, 1.0, 0.0, 0.0]);
        let bone = (height as u16).min(63);
        assignments.add(VertexBoneAssignment::new(v, bone, 0.7));
        assignments.add(VertexBoneAssignment::new(v, bone.saturating_sub(1), 0.3));
    }
    let report = rationalise_bone_assignments(vertex_count, &mut assignments);
    let map = build_index_map(&assignments).unwrap();
    let blend = compile_bone_assignments(&assignments, vertex_count, report.max_bones_per_vertex, &map).unwrap();
    let matrices = prepare_matrices_for_vertex_blend(&skeleton.bone_matrices(), &map).unwrap();
    let src = VertexBuffer::new(&src_data, VertexLayout::POSITION_NORMAL).unwrap();
    let mut dst_data = vec![0.0; src_data.len()];

    c.bench_function("software_vertex_blend_10k", |b| {
        b.iter(|| {
            let mut dst = VertexBufferMut::new(&mut dst_data, VertexLayout::POSITION_NORMAL).unwrap();
            software_vertex_blend(&src, &mut dst, black_box(&blend), black_box(&matrices), true).unwrap();
        });
    });
}

criterion_group!(benches, bench_rationalise, bench_set_animation_state, bench_software_blend);
criterion_main!(benches);
