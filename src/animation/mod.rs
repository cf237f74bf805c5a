//! 骨骼动画模块
//!
//! 提供层级骨骼、关键帧骨骼动画、动画控制器和 CPU 顶点蒙皮。
//!
//! ## 功能特性
//!
//! - 骨骼层级与变化传播
//! - 关键帧动画（CLAMP / WRAP / CYCLE 三种重复模式）
//! - 帧事件与同步标签
//! - 按权重混合多骨骼影响的顶点蒙皮
//! - 蒙皮数据移植（换装）
//!
//! ## 使用示例
//!
//! ```rust
//! use game_engine_skinning::animation::{
//!     AnimationController, BoneAnimation, BoneTransform, RepeatType, Skeleton,
//! };
//! use glam::{Mat4, Vec3};
//!
//! // 创建骨骼
//! let mut skeleton = Skeleton::new();
//! let root = skeleton.add_bone("root", None, Mat4::IDENTITY).unwrap();
//! let arm = skeleton.add_bone("arm", Some(root), Mat4::IDENTITY).unwrap();
//!
//! // 两个关键帧：arm 从原点平移到 (1, 0, 0)
//! let mut walk = BoneAnimation::with_keyframes("walk", vec![0.0, 1.0]);
//! walk.set_interpolation_rate(0.0);
//! walk.add_bone_transform(BoneTransform::with_transforms(
//!     "arm",
//!     vec![Mat4::IDENTITY, Mat4::from_translation(Vec3::X)],
//! ));
//!
//! let mut controller = AnimationController::new();
//! controller.set_repeat_type(RepeatType::Clamp);
//! controller.add_animation(walk);
//! controller.set_active_animation("walk");
//! skeleton.attach_controller(root, controller).unwrap();
//!
//! skeleton.update_geometric_state(0.5);
//! let x = skeleton.bone(arm).unwrap().world_translation().x;
//! assert!((x - 0.5).abs() < 0.001);
//! ```

pub mod bone_animation;
pub mod bone_transform;
pub mod controller;
pub mod events;
pub mod influence;
pub mod listener;
pub mod skeleton;
pub mod skin;
pub mod skin_transfer;
pub mod systems;


use serde::{Deserialize, Serialize};

pub use bone_animation::{AnimationId, BoneAnimation, InterpolationType};
pub use bone_transform::BoneTransform;
pub use controller::AnimationController;
pub use events::{AnimationEvent, AnimationEventTable, EventContext};
pub use influence::BoneInfluence;
pub use listener::{BoneChangeEvent, BoneChangeListener, ListenerId};
pub use skeleton::{Bone, Skeleton, SkeletonId};
pub use skin::{ConnectionPoint, SkinNode, SkinRefreshFlag};
pub use skin_transfer::SkinTransferNode;
pub use systems::{
    skeleton_update_system, skin_update_system, skinning_schedule, AnimationTime, SkinnedBy,
};

/// 默认插值节流间隔（秒）
pub const DEFAULT_INTERPOLATION_RATE: f32 = 1.0 / 20.0;

/// 动画重复模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatType {
    /// 播放到结尾后停止
    #[default]
    Clamp,
    /// 循环播放
    Wrap,
    /// 往返播放
    Cycle,
}
