//! 骨骼数据结构
//!
//! 骨骼以索引寻址存放在 `Skeleton` 中。父骨骼总是先于子骨骼加入，
//! 因此索引顺序就是拓扑顺序，世界变换按索引顺序一次即可算完。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::controller::AnimationController;
use super::influence::BoneInfluence;
use super::listener::{BoneChangeEvent, BoneChangeListener, ListenerEntry, ListenerId};
use crate::core::{SkeletonError, SkeletonResult};
use crate::scene::Transform;

/// 骨骼层级实例标识（运行时分配，不参与序列化）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SkeletonId(u64);

impl SkeletonId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SkeletonId {
    fn default() -> Self {
        Self::next()
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
#[derive(Debug, Serialize, Deserialize)]
pub struct Bone {
    /// 骨骼名称（层级内唯一）
    pub name: String,
    /// 父骨骼索引（None 表示根骨骼）
    parent: Option<usize>,
    #[serde(skip)]
    children: Vec<usize>,
    /// 绑定姿态（骨架空间）
    bind_matrix: Mat4,
    /// 局部变换（相对于父骨骼）
    local: Transform,
    #[serde(skip)]
    world: Transform,
    #[serde(skip)]
    old_world: Option<Transform>,
    #[serde(skip)]
    changed_up: bool,
    #[serde(skip)]
    changed_down: bool,
    #[serde(skip)]
    skin_root: bool,
    #[serde(skip)]
    listeners: Vec<ListenerEntry>,
    #[serde(default)]
    animation_controller: Option<AnimationController>,
}

impl Bone {
    fn new(name: String, parent: Option<usize>, bind_matrix: Mat4, local: Transform) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            bind_matrix,
            local,
            world: Transform::identity(),
            old_world: None,
            changed_up: false,
            changed_down: false,
            skin_root: false,
            listeners: Vec::new(),
            animation_controller: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn bind_matrix(&self) -> Mat4 {
        self.bind_matrix
    }

    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    pub fn world_rotation(&self) -> Quat {
        self.world.rotation
    }

    pub fn world_translation(&self) -> Vec3 {
        self.world.translation
    }

    pub fn world_scale(&self) -> Vec3 {
        self.world.scale
    }

    /// 本帧内该骨骼或其祖先/后代是否被修改过
    pub fn bone_changed(&self) -> bool {
        self.changed_up || self.changed_down
    }

    pub fn is_skin_root(&self) -> bool {
        self.skin_root
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn animation_controller(&self) -> Option<&AnimationController> {
        self.animation_controller.as_ref()
    }

    /// 世界变换与上次检查时相比是否变化，并记录当前值
    fn has_transform_changed(&mut self) -> bool {
        let changed = match &self.old_world {
            Some(old) => *old != self.world,
            None => true,
        };
        self.old_world = Some(self.world);
        changed
    }

    /// 将绑定姿态下的模型空间点转换到骨骼空间
    pub fn bind_inverse_point(&self, point: Vec3) -> Vec3 {
        let (_, rotation, translation) = self.bind_matrix.to_scale_rotation_translation();
        rotation.inverse() * (point - translation)
    }

    /// 将绑定姿态下的模型空间方向转换到骨骼空间
    pub fn bind_inverse_vector(&self, vector: Vec3) -> Vec3 {
        let (_, rotation, _) = self.bind_matrix.to_scale_rotation_translation();
        rotation.inverse() * vector
    }

    /// 按权重把影响量累加到顶点与法线上
    ///
    /// 偏移量尚未计算的影响量不产生贡献。
    pub fn apply_bone(&self, influence: &BoneInfluence, vstore: &mut Vec3, nstore: &mut Vec3) {
        if let Some(offset) = influence.v_offset() {
            *vstore += (self.world.rotation * offset + self.world.translation) * influence.weight;
        }
        if let Some(offset) = influence.n_offset() {
            *nstore += (self.world.rotation * offset) * influence.weight;
        }
    }
}

// ============================================================================
// 骨骼层级（Skeleton）
// ============================================================================

/// 骨骼层级组件
#[derive(Component, Debug, Serialize, Deserialize)]
#[serde(from = "SkeletonRecord")]
pub struct Skeleton {
    #[serde(skip)]
    id: SkeletonId,
    /// 所有骨骼
    bones: Vec<Bone>,
    /// 骨骼名称到索引的映射
    #[serde(skip)]
    bone_name_to_index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct SkeletonRecord {
    bones: Vec<Bone>,
}

impl From<SkeletonRecord> for Skeleton {
    fn from(record: SkeletonRecord) -> Self {
        let mut skeleton = Skeleton::new();
        for (index, mut bone) in record.bones.into_iter().enumerate() {
            if bone.parent.is_some_and(|p| p >= index) {
                tracing::warn!(
                    target: "skeleton",
                    "Bone '{}' references a parent that is not loaded before it, treating it as a root",
                    bone.name
                );
                bone.parent = None;
            }
            if let Some(parent) = bone.parent {
                skeleton.bones[parent].children.push(index);
            }
            skeleton.bone_name_to_index.entry(bone.name.clone()).or_insert(index);
            skeleton.bones.push(bone);
        }
        skeleton.compute_world_transforms();
        skeleton
    }
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

impl Skeleton {
    /// 创建空骨骼层级
    pub fn new() -> Self {
        Self {
            id: SkeletonId::next(),
            bones: Vec::new(),
            bone_name_to_index: HashMap::new(),
        }
    }

    pub fn id(&self) -> SkeletonId {
        self.id
    }

    /// 获取骨骼数量
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    fn check(&self, index: usize) -> SkeletonResult<()> {
        if index < self.bones.len() {
            Ok(())
        } else {
            Err(SkeletonError::BoneOutOfRange {
                index,
                count: self.bones.len(),
            })
        }
    }

    /// 添加骨骼
    ///
    /// `bind_matrix` 为骨架空间下的绑定姿态，局部变换由父骨骼绑定姿态推出，
    /// 新骨骼因此处于绑定姿态。
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        bind_matrix: Mat4,
    ) -> SkeletonResult<usize> {
        let name = name.into();
        if let Some(p) = parent {
            if p >= self.bones.len() {
                return Err(SkeletonError::InvalidParent {
                    bone: name,
                    parent: p,
                });
            }
        }
        if self.bone_name_to_index.contains_key(&name) {
            return Err(SkeletonError::DuplicateBoneName(name));
        }

        let local_matrix = match parent {
            Some(p) => self.bones[p].bind_matrix.inverse() * bind_matrix,
            None => bind_matrix,
        };
        let index = self.bones.len();
        let mut bone = Bone::new(
            name.clone(),
            parent,
            bind_matrix,
            Transform::from_matrix(local_matrix),
        );
        bone.world = Transform::from_matrix(bind_matrix);
        self.bones.push(bone);
        if let Some(p) = parent {
            self.bones[p].children.push(index);
        }
        self.bone_name_to_index.insert(name, index);
        self.propagate_bone_change(index, true);
        Ok(index)
    }

    /// 按名称查找骨骼
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bone_name_to_index.get(name).copied()
    }

    /// 在以 `root` 为根的子树内按名称查找骨骼
    pub fn find_bone_in_subtree(&self, root: usize, name: &str) -> Option<usize> {
        self.find_bone(name)
            .filter(|&index| self.is_in_subtree(root, index))
    }

    /// `index` 是否位于以 `root` 为根的子树内
    pub fn is_in_subtree(&self, root: usize, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if i == root {
                return true;
            }
            current = self.bones.get(i).and_then(|b| b.parent);
        }
        false
    }

    /// 子树内所有骨骼索引（先序）
    pub fn subtree(&self, root: usize) -> Vec<usize> {
        let mut result = Vec::new();
        if root >= self.bones.len() {
            return result;
        }
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            result.push(index);
            stack.extend(self.bones[index].children.iter().rev());
        }
        result
    }

    /// 沿父链找到最顶层的骨骼
    pub fn root_of(&self, index: usize) -> Option<usize> {
        let mut current = self.bones.get(index).map(|_| index)?;
        while let Some(parent) = self.bones[current].parent {
            current = parent;
        }
        Some(current)
    }

    /// 所有根骨骼
    pub fn roots(&self) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn set_bind_matrix(&mut self, index: usize, bind_matrix: Mat4) -> SkeletonResult<()> {
        self.check(index)?;
        self.bones[index].bind_matrix = bind_matrix;
        Ok(())
    }

    // ===== 局部变换 =====

    pub fn set_local_rotation(&mut self, index: usize, rotation: Quat) -> SkeletonResult<()> {
        self.check(index)?;
        self.bones[index].local.rotation = rotation;
        self.propagate_bone_change(index, true);
        Ok(())
    }

    pub fn set_local_translation(&mut self, index: usize, translation: Vec3) -> SkeletonResult<()> {
        self.check(index)?;
        self.bones[index].local.translation = translation;
        self.propagate_bone_change(index, true);
        Ok(())
    }

    pub fn set_local_scale(&mut self, index: usize, scale: Vec3) -> SkeletonResult<()> {
        self.check(index)?;
        self.bones[index].local.scale = scale;
        self.propagate_bone_change(index, true);
        Ok(())
    }

    pub fn set_local_transform(&mut self, index: usize, transform: Transform) -> SkeletonResult<()> {
        self.check(index)?;
        self.bones[index].local = transform;
        self.propagate_bone_change(index, true);
        Ok(())
    }

    /// 直接访问局部变换，不触发变化传播
    ///
    /// 批量写入后需自行调用 [`Skeleton::propagate_bone_change`]。
    pub fn local_transform_mut(&mut self, index: usize) -> Option<&mut Transform> {
        self.bones.get_mut(index).map(|b| &mut b.local)
    }

    // ===== 变化传播 =====

    /// 标记骨骼及其所有祖先和后代为已变化
    ///
    /// 已标记过的节点会截断遍历；发起者总是重新遍历。
    pub fn propagate_bone_change(&mut self, index: usize, initiator: bool) {
        if index >= self.bones.len() {
            return;
        }
        self.propagate_to_parent(index, initiator);
        self.propagate_to_children(index, initiator);
    }

    fn propagate_to_parent(&mut self, index: usize, initiator: bool) {
        let mut current = Some(index);
        let mut force = initiator;
        while let Some(i) = current {
            let bone = &mut self.bones[i];
            if bone.changed_up && !force {
                break;
            }
            bone.changed_up = true;
            force = false;
            current = bone.parent;
        }
    }

    fn propagate_to_children(&mut self, index: usize, initiator: bool) {
        let mut stack = vec![(index, initiator)];
        while let Some((i, force)) = stack.pop() {
            let bone = &mut self.bones[i];
            if bone.changed_down && !force {
                continue;
            }
            bone.changed_down = true;
            bone.changed_up = true;
            stack.extend(bone.children.iter().map(|&child| (child, false)));
        }
    }

    /// 清除所有骨骼的变化标记
    pub fn reset_change_values(&mut self) {
        for bone in &mut self.bones {
            bone.changed_up = false;
            bone.changed_down = false;
        }
    }

    // ===== 世界变换 =====

    fn compute_world_transforms(&mut self) {
        for i in 0..self.bones.len() {
            let world = match self.bones[i].parent {
                Some(p) => self.bones[p].world.mul_transform(&self.bones[i].local),
                None => self.bones[i].local,
            };
            self.bones[i].world = world;
        }
    }

    /// 重新计算世界变换，并通知发生变化的皮肤根骨骼的监听者
    pub fn update_world_vectors(&mut self) {
        self.compute_world_transforms();
        for i in 0..self.bones.len() {
            let bone = &mut self.bones[i];
            if !bone.skin_root {
                continue;
            }
            let moved = bone.has_transform_changed();
            if bone.bone_changed() || moved {
                self.fire_bone_change(i);
            }
        }
    }

    /// 每帧更新：运行挂载的动画控制器，刷新世界变换并通知监听者
    ///
    /// 变化标记在通知完成后清除，帧间的修改会在下一帧被观察到。
    pub fn update_geometric_state(&mut self, time: f32) {
        for index in 0..self.bones.len() {
            if let Some(mut controller) = self.bones[index].animation_controller.take() {
                controller.update(time, self);
                self.bones[index].animation_controller = Some(controller);
            }
        }
        self.update_world_vectors();
        self.reset_change_values();
    }

    /// 将子树恢复到绑定姿态
    pub fn revert_to_bind(&mut self, root: usize) -> SkeletonResult<()> {
        self.check(root)?;
        for index in self.subtree(root) {
            let bind = self.bones[index].bind_matrix;
            let local = match self.bones[index].parent {
                Some(p) => self.bones[p].bind_matrix.inverse() * bind,
                None => bind,
            };
            let bone = &mut self.bones[index];
            bone.world = Transform::from_matrix(bind);
            bone.local = Transform::from_matrix(local);
        }
        self.propagate_bone_change(root, true);
        Ok(())
    }

    pub fn apply_bone(
        &self,
        index: usize,
        influence: &BoneInfluence,
        vstore: &mut Vec3,
        nstore: &mut Vec3,
    ) {
        if let Some(bone) = self.bones.get(index) {
            bone.apply_bone(influence, vstore, nstore);
        }
    }

    // ===== 监听者 =====

    /// 注册监听者，骨骼随之成为皮肤根骨骼
    pub fn add_bone_listener(
        &mut self,
        index: usize,
        listener: Weak<dyn BoneChangeListener>,
    ) -> SkeletonResult<ListenerId> {
        self.check(index)?;
        let id = ListenerId::next();
        let bone = &mut self.bones[index];
        bone.listeners.push(ListenerEntry { id, listener });
        bone.skin_root = true;
        self.propagate_bone_change(index, true);
        Ok(id)
    }

    pub fn remove_bone_listener(&mut self, index: usize, id: ListenerId) -> bool {
        let Some(bone) = self.bones.get_mut(index) else {
            return false;
        };
        let before = bone.listeners.len();
        bone.listeners.retain(|entry| entry.id != id);
        if bone.listeners.is_empty() {
            bone.skin_root = false;
        }
        bone.listeners.len() != before
    }

    pub fn set_skin_root(&mut self, index: usize, skin_root: bool) -> SkeletonResult<()> {
        self.check(index)?;
        self.bones[index].skin_root = skin_root;
        Ok(())
    }

    /// 通知骨骼的所有存活监听者，并清理已释放的监听者
    pub fn fire_bone_change(&mut self, index: usize) {
        let Some(bone) = self.bones.get_mut(index) else {
            return;
        };
        let event = BoneChangeEvent {
            bone: index,
            bone_name: bone.name.clone(),
        };
        bone.listeners.retain(|entry| match entry.listener.upgrade() {
            Some(listener) => {
                listener.bone_changed(&event);
                true
            }
            None => false,
        });
        if bone.listeners.is_empty() {
            tracing::debug!(target: "skeleton", "Bone '{}' has no live listeners left", bone.name);
            bone.skin_root = false;
        }
    }

    // ===== 动画控制器 =====

    /// 将控制器挂到骨骼上，并把控制器内的动画绑定到以该骨骼为根的子树
    pub fn attach_controller(
        &mut self,
        index: usize,
        mut controller: AnimationController,
    ) -> SkeletonResult<()> {
        self.check(index)?;
        controller.bind_skeleton(self, index);
        self.bones[index].animation_controller = Some(controller);
        Ok(())
    }

    pub fn controller(&self, index: usize) -> Option<&AnimationController> {
        self.bones.get(index)?.animation_controller.as_ref()
    }

    pub fn controller_mut(&mut self, index: usize) -> Option<&mut AnimationController> {
        self.bones.get_mut(index)?.animation_controller.as_mut()
    }

    pub fn take_controller(&mut self, index: usize) -> Option<AnimationController> {
        self.bones.get_mut(index)?.animation_controller.take()
    }

    /// 重新绑定所有控制器（用于反序列化之后）
    pub fn bind_controllers(&mut self) {
        for index in 0..self.bones.len() {
            if let Some(mut controller) = self.bones[index].animation_controller.take() {
                controller.bind_skeleton(self, index);
                self.bones[index].animation_controller = Some(controller);
            }
        }
    }
}
