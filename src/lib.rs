//! # Game Engine Skinning
//!
//! Hierarchical skeletal animation and CPU vertex skinning for the game engine.
//!
//! ## Features
//!
//! - **Skeleton**: Arena-backed bone hierarchy with change propagation and bind poses
//! - **Keyframe Animation**: Timelines with clamp / wrap / cycle playback, blending and frame events
//! - **Skinning**: Per-vertex weighted bone influences recomputed on bone change
//! - **Skin Transfer**: Merging detachable skin pieces (clothing, armour) into a skinned mesh
//! - **ECS Integration**: `bevy_ecs` components and a ready-made skinning schedule
//! - **Persistence**: JSON and binary save/load with a post-load binding phase
//!
//! ## Architecture Design
//!
//! 骨骼存放在 [`animation::Skeleton`] 的数组中，父子关系用索引表示，
//! 蒙皮节点通过弱引用监听器订阅骨骼变化：
//! - **Skeleton (Component)**: 骨骼层级、动画控制器和变化标记
//! - **SkinNode (Component)**: 几何体与影响量缓存
//! - **System**: 每帧先推进骨架，再重新蒙皮
//!
//! ### Example
//!
//! ```ignore
//! use game_engine_skinning::prelude::*;
//!
//! let mut world = World::new();
//! world.insert_resource(AnimationTime::default());
//! let (_skeleton, _skin) = SkinnedModel::load_json("hero.json")?.spawn(&mut world);
//! let mut schedule = skinning_schedule();
//! schedule.run(&mut world);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Error types
//! - [`config`]: Configuration system
//! - [`scene`]: Transforms, geometry and model serialization
//! - [`animation`]: Skeletons, animations and skinning

/// Core error types shared by the pipeline
pub mod core;
/// Configuration system
pub mod config;
/// Transforms, skin geometry and serialization
pub mod scene;
/// Skeletal animation and skinning
pub mod animation;

/// 常用类型
pub mod prelude {
    pub use crate::animation::{
        skinning_schedule, AnimationController, AnimationEvent, AnimationEventTable,
        AnimationId, AnimationTime, Bone, BoneAnimation, BoneInfluence, BoneTransform,
        RepeatType, Skeleton, SkinNode, SkinTransferNode, SkinnedBy,
    };
    pub use crate::config::{init_logging, SkinningConfig};
    pub use crate::core::{EngineError, EngineResult};
    pub use crate::scene::{GeomBatch, Geometry, SkinnedModel, Transform, VertMap};
    pub use bevy_ecs::prelude::{Entity, Schedule, World};
}
