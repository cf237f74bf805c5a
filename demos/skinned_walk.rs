/// 蒙皮行走示例
///
/// 构建一条腿的骨架和网格，在 ECS 调度器中播放往返动画，
/// 最后保存并重新加载模型

use anyhow::Result;
use game_engine_skinning::prelude::*;
use glam::{Mat4, Quat, Vec3};

fn main() -> Result<()> {
    let config = SkinningConfig::load_or_default();
    init_logging(&config.logging);

    println!("=== 蒙皮行走演示 ===\n");

    let model = build_leg(&config)?;
    let model = play(model)?;
    save_and_reload(model)?;

    println!("\n=== 演示完成 ===");
    Ok(())
}

/// hip -> knee -> foot，膝盖和脚踝沿 -Y 方向各 1 个单位
fn build_leg(config: &SkinningConfig) -> Result<SkinnedModel> {
    println!("--- 1. 构建骨架与网格 ---");
    let mut skeleton = Skeleton::new();
    let hip = skeleton.add_bone("hip", None, Mat4::IDENTITY)?;
    let knee = skeleton.add_bone("knee", Some(hip), Mat4::from_translation(-Vec3::Y))?;
    let foot = skeleton.add_bone("foot", Some(knee), Mat4::from_translation(-Vec3::Y))?;

    let mut walk = BoneAnimation::with_keyframes("walk", vec![0.0, 0.5, 1.0]);
    walk.apply_config(&config.animation);
    walk.add_bone_transform(BoneTransform::with_transforms(
        "hip",
        vec![
            Mat4::from_rotation_x(-0.4),
            Mat4::from_rotation_x(0.4),
            Mat4::from_rotation_x(-0.4),
        ],
    ));
    walk.add_bone_transform(BoneTransform::with_transforms(
        "knee",
        vec![
            Mat4::from_translation(-Vec3::Y),
            Mat4::from_rotation_translation(Quat::from_rotation_x(0.6), -Vec3::Y),
            Mat4::from_translation(-Vec3::Y),
        ],
    ));
    walk.add_sync("foot_down", [0usize, 2]);

    let mut controller = AnimationController::from_config(&config.animation);
    controller.set_repeat_type(RepeatType::Cycle);
    let walk_id = controller.add_animation(walk);
    controller.set_active_animation_by_id(walk_id);
    controller.on_frame(walk_id, 2, |context| {
        tracing::info!(target: "demo", "{} reached frame {}", context.animation_name, context.frame);
    });
    skeleton.attach_controller(hip, controller)?;

    let vertices = vec![
        Vec3::new(0.1, -0.5, 0.0),
        Vec3::new(0.1, -1.0, 0.0),
        Vec3::new(0.1, -1.5, 0.0),
        Vec3::new(0.1, -2.0, 0.0),
    ];
    let normals = vec![Vec3::X; vertices.len()];
    let mut skin = SkinNode::with_config("leg", &config.skin);
    skin.set_skin(Geometry::new("leg").with_batch(GeomBatch::new("leg", vertices, normals)));
    skin.add_bone_influence(0, 0, &skeleton, hip, 1.0)?;
    skin.add_bone_influence(0, 1, &skeleton, hip, 0.5)?;
    skin.add_bone_influence(0, 1, &skeleton, knee, 0.5)?;
    skin.add_bone_influence(0, 2, &skeleton, knee, 1.0)?;
    skin.add_bone_influence(0, 3, &skeleton, foot, 1.0)?;
    skin.add_connection_point("toe", "foot");
    skin.set_skeleton(&mut skeleton, hip)?;

    println!("骨骼数: {}", skeleton.bone_count());
    println!("受影响顶点数: {}", skin.influence_count(0));
    Ok(SkinnedModel::new(skeleton, skin))
}

/// 在 ECS 调度器中以 30 FPS 播放两秒
fn play(model: SkinnedModel) -> Result<SkinnedModel> {
    println!("\n--- 2. 播放动画 ---");
    let mut world = World::new();
    world.insert_resource(AnimationTime::default());
    let (skeleton_entity, skin_entity) = model.spawn(&mut world);
    let mut schedule = skinning_schedule();

    for tick in 0..60 {
        world.resource_mut::<AnimationTime>().advance(1.0 / 30.0);
        schedule.run(&mut world);

        if tick % 10 == 0 {
            if let Some(skin) = world.get::<SkinNode>(skin_entity) {
                let foot = skin
                    .skin()
                    .and_then(|g| g.batch(0))
                    .map(|b| b.vertices()[3])
                    .unwrap_or_default();
                println!("  t={:.2}s 脚底顶点: {:?}", world.resource::<AnimationTime>().elapsed_seconds, foot);
            }
        }
    }

    let skeleton = world
        .entity_mut(skeleton_entity)
        .take::<Skeleton>()
        .ok_or_else(|| anyhow::anyhow!("skeleton entity lost its component"))?;
    let skin = world
        .entity_mut(skin_entity)
        .take::<SkinNode>()
        .ok_or_else(|| anyhow::anyhow!("skin entity lost its component"))?;
    Ok(SkinnedModel::new(skeleton, skin))
}

fn save_and_reload(mut model: SkinnedModel) -> Result<()> {
    println!("\n--- 3. 保存与加载 ---");
    let dir = std::env::temp_dir().join("game_engine_skinning_demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("leg.json");

    model.save_json(&path)?;
    let bytes = model.to_bytes()?;
    println!("已保存: {:?} (二进制 {} 字节)", path, bytes.len());

    let loaded = SkinnedModel::load_json(&path)?;
    let animation = loaded
        .skeleton
        .controller(0)
        .and_then(|c| c.active_animation())
        .map(|a| a.name().to_string());
    println!("重新加载完成，活动动画: {:?}", animation);
    Ok(())
}
