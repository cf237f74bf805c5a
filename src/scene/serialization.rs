//! 蒙皮模型序列化
//!
//! 骨架与蒙皮节点一起保存。引用关系（骨骼名称、根骨骼名称）在加载后由
//! [`SkinnedModel::bind`] 统一解析；帧事件不参与序列化。

use std::fs;
use std::path::Path;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::animation::{Skeleton, SkinNode, SkinnedBy};
use crate::core::{SerializationError, SerializationResult};

/// 可序列化的蒙皮模型（骨架 + 蒙皮节点）
#[derive(Debug, Serialize, Deserialize)]
pub struct SkinnedModel {
    pub skeleton: Skeleton,
    pub skin: SkinNode,
}

impl SkinnedModel {
    pub fn new(skeleton: Skeleton, skin: SkinNode) -> Self {
        Self { skeleton, skin }
    }

    /// 保存前把骨架和顶点恢复到绑定姿态
    fn prepare_for_save(&mut self) -> SerializationResult<()> {
        if self.skin.is_bound_to(&self.skeleton) {
            self.skin
                .revert_to_bind(&mut self.skeleton)
                .map_err(|e| SerializationError::UnresolvedReference(e.to_string()))?;
        }
        Ok(())
    }

    /// 加载后的第二阶段：解析控制器、影响量和蒙皮根骨骼的引用
    pub fn bind(&mut self) -> SerializationResult<()> {
        self.skeleton.bind_controllers();
        self.skin
            .bind_skeleton(&mut self.skeleton)
            .map_err(|e| SerializationError::UnresolvedReference(e.to_string()))?;
        self.skeleton.update_world_vectors();
        tracing::debug!(
            target: "serialization",
            "Bound skinned model '{}' ({} bones)",
            self.skin.name,
            self.skeleton.bone_count()
        );
        Ok(())
    }

    /// 序列化为JSON字符串
    pub fn to_json_string(&mut self) -> SerializationResult<String> {
        self.prepare_for_save()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从JSON字符串解析（尚未绑定）
    pub fn from_json_str(json: &str) -> SerializationResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 序列化为二进制
    pub fn to_bytes(&mut self) -> SerializationResult<Vec<u8>> {
        self.prepare_for_save()?;
        Ok(bincode::serialize(self)?)
    }

    /// 从二进制解析（尚未绑定）
    pub fn from_bytes(bytes: &[u8]) -> SerializationResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// 保存到JSON文件
    pub fn save_json<P: AsRef<Path>>(&mut self, path: P) -> SerializationResult<()> {
        let json = self.to_json_string()?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 从JSON文件加载并绑定
    pub fn load_json<P: AsRef<Path>>(path: P) -> SerializationResult<Self> {
        let json = fs::read_to_string(path)?;
        let mut model = Self::from_json_str(&json)?;
        model.bind()?;
        Ok(model)
    }

    /// 把骨架和蒙皮节点作为两个实体放入 World，返回 (骨架实体, 蒙皮实体)
    pub fn spawn(self, world: &mut World) -> (Entity, Entity) {
        let skeleton = world.spawn(self.skeleton).id();
        let skin = world.spawn((self.skin, SkinnedBy { skeleton })).id();
        (skeleton, skin)
    }
}
