//! 蒙皮管线性能基准测试
//!
//! 测试骨骼世界变换更新、动画推进和顶点蒙皮的性能

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use game_engine_skinning::animation::{
    AnimationController, BoneAnimation, BoneTransform, RepeatType, Skeleton, SkinNode,
};
use game_engine_skinning::scene::{GeomBatch, Geometry};
use glam::{Mat4, Quat, Vec3};

/// 单链骨骼，每根骨骼沿 Y 轴偏移 1
fn chain(bones: usize) -> Skeleton {
    let mut skeleton = Skeleton::new();
    let mut parent = None;
    for i in 0..bones {
        let bind = Mat4::from_translation(Vec3::new(0.0, i as f32, 0.0));
        let index = skeleton
            .add_bone(format!("bone_{i}"), parent, bind)
            .expect("valid parent");
        parent = Some(index);
    }
    skeleton
}

fn sway(bones: usize) -> BoneAnimation {
    let mut animation = BoneAnimation::with_keyframes("sway", vec![0.0, 0.5, 1.0]);
    animation.set_interpolation_rate(0.0);
    for i in 1..bones {
        animation.add_bone_transform(BoneTransform::with_transforms(
            format!("bone_{i}"),
            vec![
                Mat4::from_translation(Vec3::Y),
                Mat4::from_rotation_translation(Quat::from_rotation_z(0.3), Vec3::Y),
                Mat4::from_translation(Vec3::Y),
            ],
        ));
    }
    animation
}

fn skinned(bones: usize, vertices: usize) -> (Skeleton, SkinNode) {
    let mut skeleton = chain(bones);
    let mut controller = AnimationController::new();
    controller.set_repeat_type(RepeatType::Wrap);
    controller.add_animation(sway(bones));
    controller.set_active_animation("sway");
    skeleton.attach_controller(0, controller).expect("root exists");

    let positions: Vec<Vec3> = (0..vertices)
        .map(|i| Vec3::new(0.5, i as f32 * bones as f32 / vertices as f32, 0.0))
        .collect();
    let normals = vec![Vec3::X; vertices];
    let mut skin = SkinNode::new("tube");
    skin.set_skin(Geometry::new("tube").with_batch(GeomBatch::new("tube", positions, normals)));
    for vertex in 0..vertices {
        let bone = vertex * bones / vertices;
        skin.add_bone_influence(0, vertex, &skeleton, bone, 0.75)
            .expect("vertex in range");
        let next = (bone + 1).min(bones - 1);
        skin.add_bone_influence(0, vertex, &skeleton, next, 0.25)
            .expect("vertex in range");
    }
    skin.set_skeleton(&mut skeleton, 0).expect("root exists");
    skin.update_geometric_state(&skeleton).expect("bound skeleton");
    (skeleton, skin)
}

fn bench_world_vectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("skeleton_world_vectors");

    for bones in [16, 64, 256] {
        let mut skeleton = chain(bones);
        group.bench_with_input(BenchmarkId::from_parameter(bones), &bones, |b, _| {
            b.iter(|| {
                skeleton
                    .set_local_rotation(0, Quat::from_rotation_y(0.1))
                    .expect("root exists");
                skeleton.update_world_vectors();
                skeleton.reset_change_values();
                black_box(skeleton.bone(bones - 1).map(|b| b.world_translation()));
            });
        });
    }

    group.finish();
}

fn bench_animation_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("animation_tick");

    for bones in [16, 64] {
        let (mut skeleton, _) = skinned(bones, 8);
        group.bench_with_input(BenchmarkId::from_parameter(bones), &bones, |b, _| {
            b.iter(|| skeleton.update_geometric_state(black_box(1.0 / 60.0)));
        });
    }

    group.finish();
}

fn bench_skinning(c: &mut Criterion) {
    let mut group = c.benchmark_group("skin_update");

    for vertices in [256, 4096] {
        let (mut skeleton, mut skin) = skinned(32, vertices);
        group.bench_with_input(
            BenchmarkId::from_parameter(vertices),
            &vertices,
            |b, _| {
                b.iter(|| {
                    skeleton.update_geometric_state(1.0 / 60.0);
                    skin.update_geometric_state(&skeleton).expect("bound skeleton");
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_world_vectors, bench_animation_tick, bench_skinning);
criterion_main!(benches);
