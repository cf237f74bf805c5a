//! ECS 集成
//!
//! 骨架与蒙皮节点作为组件挂在实体上，每帧先推进骨架再重新蒙皮。

use bevy_ecs::prelude::*;

use super::skeleton::Skeleton;
use super::skin::SkinNode;

/// 动画时间资源
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct AnimationTime {
    pub delta_seconds: f32,
    pub elapsed_seconds: f64,
}

impl AnimationTime {
    pub fn advance(&mut self, delta_seconds: f32) {
        self.delta_seconds = delta_seconds;
        self.elapsed_seconds += delta_seconds as f64;
    }
}

/// 蒙皮节点所使用的骨架实体
#[derive(Component, Debug, Clone, Copy)]
pub struct SkinnedBy {
    pub skeleton: Entity,
}

/// 骨架更新系统 - 运行动画控制器并刷新世界变换
pub fn skeleton_update_system(time: Res<AnimationTime>, mut skeletons: Query<&mut Skeleton>) {
    for mut skeleton in skeletons.iter_mut() {
        skeleton.update_geometric_state(time.delta_seconds);
    }
}

/// 蒙皮更新系统 - 骨骼变化后重新计算顶点
pub fn skin_update_system(
    mut skins: Query<(Entity, &mut SkinNode, &SkinnedBy)>,
    skeletons: Query<&Skeleton>,
) {
    for (entity, mut skin, link) in skins.iter_mut() {
        let Ok(skeleton) = skeletons.get(link.skeleton) else {
            tracing::warn!(
                target: "skin",
                "Skin entity {:?} references missing skeleton {:?}",
                entity,
                link.skeleton
            );
            continue;
        };
        if let Err(e) = skin.update_geometric_state(skeleton) {
            tracing::warn!(target: "skin", "Skin '{}' update failed: {}", skin.name, e);
        }
    }
}

/// 创建蒙皮调度器（骨架更新先于蒙皮更新）
pub fn skinning_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((skeleton_update_system, skin_update_system).chain());
    schedule
}
