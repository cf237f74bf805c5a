//! 蒙皮节点
//!
//! 每个顶点可以受多根骨骼按权重影响。绑定骨架时，顶点被转换到各骨骼的
//! 绑定空间得到偏移量；之后每当骨骼姿态变化，顶点位置由各骨骼当前世界
//! 变换作用于偏移量后按权重累加得到。

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use super::influence::BoneInfluence;
use super::listener::{BoneChangeEvent, BoneChangeListener, ListenerId};
use super::skeleton::{Skeleton, SkeletonId};
use super::skin_transfer::SkinTransferNode;
use crate::config::SkinConfig;
use crate::core::{SkeletonError, SkinError, SkinResult};
use crate::scene::{Geometry, Transform, VertMap};

/// 影响量缓存：批次 -> 顶点 -> 影响量列表（空列表表示不受骨骼影响）
pub type InfluenceCache = Vec<Vec<Vec<BoneInfluence>>>;

// ============================================================================
// 刷新标记
// ============================================================================

/// 骨骼变化时置位的刷新标记，蒙皮节点以弱引用形式注册给骨骼
#[derive(Debug)]
pub struct SkinRefreshFlag {
    needs_refresh: AtomicBool,
}

impl Default for SkinRefreshFlag {
    fn default() -> Self {
        Self {
            needs_refresh: AtomicBool::new(true),
        }
    }
}

impl SkinRefreshFlag {
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh.load(Ordering::Acquire)
    }

    pub fn mark(&self) {
        self.needs_refresh.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.needs_refresh.swap(false, Ordering::AcqRel)
    }
}

impl BoneChangeListener for SkinRefreshFlag {
    fn bone_changed(&self, _event: &BoneChangeEvent) {
        self.mark();
    }
}

// ============================================================================
// 连接点
// ============================================================================

/// 跟随骨骼世界变换的挂点（武器、特效等）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionPoint {
    pub name: String,
    pub bone_id: String,
    #[serde(skip)]
    bone: Option<usize>,
    #[serde(skip)]
    world: Transform,
}

impl ConnectionPoint {
    pub fn new(name: impl Into<String>, bone_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bone_id: bone_id.into(),
            bone: None,
            world: Transform::identity(),
        }
    }

    pub fn bone(&self) -> Option<usize> {
        self.bone
    }

    pub fn world_transform(&self) -> &Transform {
        &self.world
    }
}

// ============================================================================
// 蒙皮节点
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct SkeletonBinding {
    skeleton: SkeletonId,
    root: usize,
    listener: ListenerId,
}

fn default_true() -> bool {
    true
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

/// 蒙皮节点组件
#[derive(Component, Debug, Serialize, Deserialize)]
pub struct SkinNode {
    pub name: String,
    #[serde(default)]
    skin: Option<Geometry>,
    #[serde(default)]
    skeleton_root_id: Option<String>,
    #[serde(default)]
    cache: InfluenceCache,
    #[serde(default)]
    connection_points: Vec<ConnectionPoint>,
    #[serde(default = "default_true")]
    recalc_bounds: bool,
    #[serde(default = "default_true")]
    recalc_normals: bool,
    #[serde(default = "unit_scale")]
    world_scale: Vec3,
    #[serde(skip)]
    bind_matrix: Mat4,
    #[serde(skip)]
    binding: Option<SkeletonBinding>,
    #[serde(skip)]
    new_skeleton_assigned: bool,
    #[serde(skip)]
    refresh: Arc<SkinRefreshFlag>,
}

impl SkinNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skin: None,
            skeleton_root_id: None,
            cache: Vec::new(),
            connection_points: Vec::new(),
            recalc_bounds: true,
            recalc_normals: true,
            world_scale: Vec3::ONE,
            bind_matrix: Mat4::IDENTITY,
            binding: None,
            new_skeleton_assigned: false,
            refresh: Arc::new(SkinRefreshFlag::default()),
        }
    }

    pub fn with_config(name: impl Into<String>, config: &SkinConfig) -> Self {
        let mut node = Self::new(name);
        node.apply_config(config);
        node
    }

    pub fn apply_config(&mut self, config: &SkinConfig) {
        self.recalc_bounds = config.recalc_bounds;
        self.recalc_normals = config.recalc_normals;
    }

    // ===== 几何体 =====

    pub fn skin(&self) -> Option<&Geometry> {
        self.skin.as_ref()
    }

    pub fn skin_mut(&mut self) -> Option<&mut Geometry> {
        self.skin.as_mut()
    }

    /// 设置蒙皮几何体；已有的影响量缓存保持不变
    pub fn set_skin(&mut self, skin: Geometry) {
        self.skin = Some(skin);
        self.refresh.mark();
    }

    pub fn is_recalc_bounds(&self) -> bool {
        self.recalc_bounds
    }

    pub fn set_recalc_bounds(&mut self, recalc: bool) {
        self.recalc_bounds = recalc;
    }

    pub fn is_recalc_normals(&self) -> bool {
        self.recalc_normals
    }

    pub fn set_recalc_normals(&mut self, recalc: bool) {
        self.recalc_normals = recalc;
    }

    pub fn world_scale(&self) -> Vec3 {
        self.world_scale
    }

    pub fn set_world_scale(&mut self, scale: Vec3) {
        self.world_scale = scale;
        self.refresh.mark();
    }

    /// 蒙皮节点的世界变换只保留缩放，位置与朝向完全由骨骼决定
    pub fn world_transform(&self) -> Transform {
        Transform {
            scale: self.world_scale,
            ..Transform::identity()
        }
    }

    pub fn bind_matrix(&self) -> Mat4 {
        self.bind_matrix
    }

    /// 设置绑定时施加在顶点上的矩阵，下一次更新时重新计算偏移量
    pub fn set_bind_matrix(&mut self, bind_matrix: Mat4) {
        self.bind_matrix = bind_matrix;
        if self.binding.is_some() {
            self.new_skeleton_assigned = true;
        }
    }

    pub fn needs_refresh(&self) -> bool {
        self.refresh.needs_refresh()
    }

    pub fn refresh_flag(&self) -> &Arc<SkinRefreshFlag> {
        &self.refresh
    }

    // ===== 影响量缓存 =====

    pub fn cache(&self) -> &InfluenceCache {
        &self.cache
    }

    pub fn set_cache(&mut self, cache: InfluenceCache) {
        self.cache = cache;
        if self.binding.is_some() {
            self.new_skeleton_assigned = true;
        }
    }

    pub(crate) fn into_skin_and_cache(self) -> (Option<Geometry>, InfluenceCache) {
        (self.skin, self.cache)
    }

    /// 某个顶点上的影响量
    pub fn influences(&self, batch: usize, vertex: usize) -> &[BoneInfluence] {
        self.cache
            .get(batch)
            .and_then(|slots| slots.get(vertex))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 按当前几何体重建空缓存
    pub fn recreate_cache(&mut self) -> SkinResult<()> {
        let skin = self.skin.as_ref().ok_or(SkinError::NoSkin)?;
        self.cache = skin
            .batches()
            .iter()
            .map(|batch| vec![Vec::new(); batch.vertex_count()])
            .collect();
        Ok(())
    }

    /// 让缓存覆盖所有批次和顶点，已有影响量保留
    fn ensure_cache_shape(&mut self) {
        let Some(skin) = &self.skin else {
            return;
        };
        for (index, batch) in skin.batches().iter().enumerate() {
            if index == self.cache.len() {
                self.cache.push(Vec::new());
            }
            let slots = &mut self.cache[index];
            if slots.len() < batch.vertex_count() {
                slots.resize(batch.vertex_count(), Vec::new());
            }
        }
    }

    /// 以已解析骨骼添加影响量
    pub fn add_bone_influence(
        &mut self,
        batch: usize,
        vertex: usize,
        skeleton: &Skeleton,
        bone: usize,
        weight: f32,
    ) -> SkinResult<()> {
        let name = skeleton
            .bone(bone)
            .map(|b| b.name.clone())
            .ok_or(SkeletonError::BoneOutOfRange {
                index: bone,
                count: skeleton.bone_count(),
            })?;
        self.push_influence(batch, vertex, BoneInfluence::with_bone(bone, name, weight))
    }

    /// 以骨骼名称添加影响量，绑定骨架时解析
    pub fn add_bone_influence_by_id(
        &mut self,
        batch: usize,
        vertex: usize,
        bone_id: impl Into<String>,
        weight: f32,
    ) -> SkinResult<()> {
        self.push_influence(batch, vertex, BoneInfluence::new(bone_id, weight))
    }

    /// 权重为 0 的影响量被忽略；同一顶点上同名骨骼只保留第一次添加的影响量
    fn push_influence(
        &mut self,
        batch: usize,
        vertex: usize,
        influence: BoneInfluence,
    ) -> SkinResult<()> {
        if influence.weight == 0.0 {
            return Ok(());
        }
        if self.skin.is_none() {
            return Err(SkinError::NoSkin);
        }
        self.ensure_cache_shape();

        let count = self.cache.len();
        let slots = self
            .cache
            .get_mut(batch)
            .ok_or(SkinError::BatchOutOfRange { batch, count })?;
        let count = slots.len();
        let influences = slots
            .get_mut(vertex)
            .ok_or(SkinError::VertexOutOfRange {
                batch,
                vertex,
                count,
            })?;
        if !influences.contains(&influence) {
            influences.push(influence);
        }
        Ok(())
    }

    /// 某个批次上的影响量总数
    pub fn influence_count(&self, batch: usize) -> usize {
        self.cache
            .get(batch)
            .map_or(0, |slots| slots.iter().map(Vec::len).sum())
    }

    /// 把每个顶点的权重归一化到和为 1
    pub fn normalize_weights(&mut self) {
        for batch in 0..self.cache.len() {
            self.normalize_batch_weights(batch);
        }
    }

    pub fn normalize_batch_weights(&mut self, batch: usize) {
        let Some(slots) = self.cache.get_mut(batch) else {
            return;
        };
        for influences in slots.iter_mut() {
            let total: f32 = influences.iter().map(|i| i.weight).sum();
            if total > 0.0 {
                for influence in influences.iter_mut() {
                    influence.weight /= total;
                }
            }
        }
    }

    /// 顶点重排后按映射表搬移影响量
    pub fn remap_influences(&mut self, mappings: &[VertMap]) -> SkinResult<()> {
        for (batch, map) in mappings.iter().enumerate() {
            self.remap_batch_influences(map, batch)?;
        }
        Ok(())
    }

    pub fn remap_batch_influences(&mut self, map: &VertMap, batch: usize) -> SkinResult<()> {
        let skin = self.skin.as_ref().ok_or(SkinError::NoSkin)?;
        let vertex_count = skin
            .batch(batch)
            .map(|b| b.vertex_count())
            .ok_or(SkinError::BatchOutOfRange {
                batch,
                count: skin.batch_count(),
            })?;
        let Some(old) = self.cache.get_mut(batch) else {
            return Ok(());
        };

        let mut remapped: Vec<Vec<BoneInfluence>> = vec![Vec::new(); vertex_count];
        for (old_index, influences) in std::mem::take(old).into_iter().enumerate() {
            let new_index = map.new_index(old_index);
            let Some(slot) = remapped.get_mut(new_index) else {
                tracing::warn!(
                    target: "skin",
                    "{}: vertex {} remapped to {} outside batch {} ({} vertices)",
                    self.name,
                    old_index,
                    new_index,
                    batch,
                    vertex_count
                );
                continue;
            };
            for influence in influences {
                if influence.weight != 0.0 && !slot.contains(&influence) {
                    slot.push(influence);
                }
            }
        }
        self.cache[batch] = remapped;
        self.normalize_batch_weights(batch);
        self.refresh.mark();
        Ok(())
    }

    /// 同时从几何体和缓存中移除批次
    pub fn remove_batch(&mut self, index: usize) -> SkinResult<()> {
        let skin = self.skin.as_mut().ok_or(SkinError::NoSkin)?;
        let count = skin.batch_count();
        skin.remove_batch(index)
            .ok_or(SkinError::BatchOutOfRange { batch: index, count })?;
        if index < self.cache.len() {
            self.cache.remove(index);
        }
        Ok(())
    }

    /// 交换两个批次（几何体与缓存一起交换）
    pub fn batch_change(&mut self, a: usize, b: usize) -> SkinResult<()> {
        let count = self.skin.as_ref().ok_or(SkinError::NoSkin)?.batch_count();
        for batch in [a, b] {
            if batch >= count {
                return Err(SkinError::BatchOutOfRange { batch, count });
            }
        }
        self.ensure_cache_shape();
        if let Some(skin) = self.skin.as_mut() {
            skin.swap_batches(a, b);
        }
        self.cache.swap(a, b);
        Ok(())
    }

    // ===== 骨架绑定 =====

    pub fn skeleton_root(&self) -> Option<usize> {
        self.binding.map(|b| b.root)
    }

    pub fn skeleton_root_id(&self) -> Option<&str> {
        self.skeleton_root_id.as_deref()
    }

    pub fn is_bound_to(&self, skeleton: &Skeleton) -> bool {
        self.binding.is_some_and(|b| b.skeleton == skeleton.id())
    }

    fn binding_for(&self, skeleton: &Skeleton) -> SkinResult<SkeletonBinding> {
        let binding = self.binding.ok_or(SkinError::NoSkeleton)?;
        if binding.skeleton != skeleton.id() {
            return Err(SkinError::SkeletonMismatch);
        }
        Ok(binding)
    }

    /// 绑定到以 `root` 为根的骨架子树
    ///
    /// 节点以弱引用监听根骨骼的变化；影响量在下一次更新时解析。
    pub fn set_skeleton(&mut self, skeleton: &mut Skeleton, root: usize) -> SkinResult<()> {
        if let Some(old) = self.binding.take() {
            if old.skeleton == skeleton.id() {
                skeleton.remove_bone_listener(old.root, old.listener);
            } else {
                // 换一个新标记，旧骨架持有的弱引用随之失效
                self.refresh = Arc::new(SkinRefreshFlag::default());
            }
        }

        let weak: Weak<dyn BoneChangeListener> = Arc::downgrade(&self.refresh) as Weak<SkinRefreshFlag>;
        let listener = skeleton.add_bone_listener(root, weak)?;
        self.binding = Some(SkeletonBinding {
            skeleton: skeleton.id(),
            root,
            listener,
        });
        self.skeleton_root_id = skeleton.bone(root).map(|b| b.name.clone());
        self.new_skeleton_assigned = true;
        self.refresh.mark();
        tracing::debug!(
            target: "skin",
            "{}: bound to skeleton root '{}'",
            self.name,
            self.skeleton_root_id.as_deref().unwrap_or("?")
        );
        Ok(())
    }

    /// 解除绑定，返回是否曾经绑定到该骨架
    pub fn detach_skeleton(&mut self, skeleton: &mut Skeleton) -> bool {
        match self.binding {
            Some(binding) if binding.skeleton == skeleton.id() => {
                skeleton.remove_bone_listener(binding.root, binding.listener);
                self.binding = None;
                true
            }
            _ => false,
        }
    }

    /// 加载后的第二阶段：按保存的根骨骼名称重新绑定并解析所有影响量
    pub fn bind_skeleton(&mut self, skeleton: &mut Skeleton) -> SkinResult<()> {
        let root_id = self.skeleton_root_id.clone().ok_or(SkinError::NoSkeleton)?;
        let root = skeleton
            .find_bone(&root_id)
            .ok_or(SkinError::RootNotFound(root_id))?;
        self.set_skeleton(skeleton, root)?;
        self.assign_skeleton_bone_influences(skeleton)
    }

    /// 在骨架子树内解析所有影响量和连接点，重新计算偏移量并归一化权重
    pub fn assign_skeleton_bone_influences(&mut self, skeleton: &Skeleton) -> SkinResult<()> {
        let binding = self.binding_for(skeleton)?;
        let mut unresolved = 0usize;
        for influence in self.cache.iter_mut().flatten().flatten() {
            if !influence.assign_bone(skeleton, binding.root) {
                unresolved += 1;
            }
        }
        if unresolved > 0 {
            tracing::warn!(
                target: "skin",
                "{}: {} bone influence(s) could not be resolved",
                self.name,
                unresolved
            );
        }
        for point in &mut self.connection_points {
            point.bone = skeleton.find_bone_in_subtree(binding.root, &point.bone_id);
        }

        self.regen_influence_offsets(skeleton)?;
        self.normalize_weights();
        self.new_skeleton_assigned = false;
        self.refresh.mark();
        Ok(())
    }

    /// 以当前顶点缓冲区（先经绑定矩阵变换）为绑定姿态，计算各影响量的偏移量
    pub fn regen_influence_offsets(&mut self, skeleton: &Skeleton) -> SkinResult<()> {
        let skin = self.skin.as_ref().ok_or(SkinError::NoSkin)?;
        let bind_matrix = self.bind_matrix;
        let recalc_normals = self.recalc_normals;

        for (batch, slots) in skin.batches().iter().zip(self.cache.iter_mut()) {
            let vertices = batch.vertices();
            let normals = batch.normals();
            for (index, influences) in slots.iter_mut().enumerate() {
                if influences.is_empty() {
                    continue;
                }
                let Some(&vertex) = vertices.get(index) else {
                    continue;
                };
                let vertex = bind_matrix.transform_point3(vertex);
                let normal = normals
                    .get(index)
                    .filter(|_| recalc_normals)
                    .map(|n| bind_matrix.transform_vector3(*n));

                for influence in influences.iter_mut() {
                    match influence.bone().and_then(|b| skeleton.bone(b)) {
                        Some(bone) => influence.set_offsets(
                            Some(bone.bind_inverse_point(vertex)),
                            normal.map(|n| bone.bind_inverse_vector(n)),
                        ),
                        None => influence.set_offsets(None, None),
                    }
                }
            }
        }
        Ok(())
    }

    /// 按骨骼当前姿态重新计算所有受影响顶点
    pub fn update_skin(&mut self, skeleton: &Skeleton) -> SkinResult<()> {
        self.deform(skeleton, self.world_scale)
    }

    fn deform(&mut self, skeleton: &Skeleton, scale: Vec3) -> SkinResult<()> {
        let skin = self.skin.as_mut().ok_or(SkinError::NoSkin)?;
        let recalc_normals = self.recalc_normals;

        for (index, slots) in self.cache.iter().enumerate() {
            let Some(batch) = skin.batch_mut(index) else {
                break;
            };
            batch.set_has_dirty_vertices(true);
            let (vertices, normals) = batch.buffers_mut();
            for (vert, influences) in slots.iter().enumerate() {
                if influences.is_empty() {
                    continue;
                }
                let mut vertex = Vec3::ZERO;
                let mut normal = Vec3::ZERO;
                for influence in influences {
                    if let Some(bone) = influence.bone() {
                        skeleton.apply_bone(bone, influence, &mut vertex, &mut normal);
                    }
                }
                if let Some(slot) = vertices.get_mut(vert) {
                    *slot = vertex * scale;
                }
                if recalc_normals {
                    if let Some(slot) = normals.get_mut(vert) {
                        *slot = normal;
                    }
                }
            }
        }
        Ok(())
    }

    /// 每帧更新：必要时解析影响量，骨骼变化后重新蒙皮并刷新包围盒和连接点
    pub fn update_geometric_state(&mut self, skeleton: &Skeleton) -> SkinResult<()> {
        if self.binding.is_none() {
            return Ok(());
        }
        let binding = self.binding_for(skeleton)?;
        if self.new_skeleton_assigned {
            self.assign_skeleton_bone_influences(skeleton)?;
        }

        if self.skin.is_some() && self.refresh.take() {
            self.update_skin(skeleton)?;
            if self.recalc_bounds {
                if let Some(skin) = self.skin.as_mut() {
                    skin.update_model_bound();
                }
            }
        }

        let scale = self.world_scale;
        for point in &mut self.connection_points {
            if point.bone.is_none() {
                point.bone = skeleton.find_bone_in_subtree(binding.root, &point.bone_id);
            }
            if let Some(bone) = point.bone.and_then(|b| skeleton.bone(b)) {
                let world = bone.world_transform();
                point.world = Transform {
                    translation: world.translation * scale,
                    rotation: world.rotation,
                    scale: world.scale * scale,
                };
            }
        }
        Ok(())
    }

    /// 把骨架恢复到绑定姿态，顶点随之回到绑定位置，绑定矩阵重置为单位矩阵
    pub fn revert_to_bind(&mut self, skeleton: &mut Skeleton) -> SkinResult<()> {
        let binding = self.binding_for(skeleton)?;
        let top = skeleton.root_of(binding.root).unwrap_or(binding.root);
        skeleton.revert_to_bind(top)?;
        self.deform(skeleton, Vec3::ONE)?;
        self.bind_matrix = Mat4::IDENTITY;
        Ok(())
    }

    // ===== 连接点 =====

    pub fn add_connection_point(&mut self, name: impl Into<String>, bone_id: impl Into<String>) {
        self.connection_points.push(ConnectionPoint::new(name, bone_id));
    }

    pub fn connection_points(&self) -> &[ConnectionPoint] {
        &self.connection_points
    }

    pub fn connection_point(&self, name: &str) -> Option<&ConnectionPoint> {
        self.connection_points.iter().find(|p| p.name == name)
    }

    // ===== 动画 =====

    fn controller_bone(&self, skeleton: &Skeleton) -> Option<usize> {
        let root = self.binding?.root;
        if skeleton.controller(root).is_some() {
            return Some(root);
        }
        skeleton
            .root_of(root)
            .filter(|&top| skeleton.controller(top).is_some())
    }

    /// 切换骨架控制器的活动动画
    pub fn set_animation(&self, skeleton: &mut Skeleton, name: &str) -> bool {
        match self.controller_bone(skeleton) {
            Some(bone) => skeleton
                .controller_mut(bone)
                .is_some_and(|c| c.set_active_animation(name)),
            None => false,
        }
    }

    pub fn set_animation_index(&self, skeleton: &mut Skeleton, index: usize) -> bool {
        match self.controller_bone(skeleton) {
            Some(bone) => skeleton
                .controller_mut(bone)
                .is_some_and(|c| c.set_active_animation_index(index)),
            None => false,
        }
    }

    /// 当前活动动画名称
    pub fn animation_name<'a>(&self, skeleton: &'a Skeleton) -> Option<&'a str> {
        let bone = self.controller_bone(skeleton)?;
        skeleton
            .controller(bone)?
            .active_animation()
            .map(|a| a.name())
    }

    // ===== 蒙皮移植 =====

    /// 吸收一个移植节点的几何体与影响量
    ///
    /// 移植节点带皮肤区域时，本节点同区域的批次被替换，同名批次保留原有的。
    /// 返回新加入的批次数。
    pub fn assimilate(&mut self, donor: SkinTransferNode) -> SkinResult<usize> {
        let (geometry, donor_cache, region) = donor.into_parts();
        let geometry = geometry.ok_or(SkinError::NoSkin)?;
        if self.skin.is_none() {
            self.skin = Some(Geometry::new(self.name.clone()));
        }
        self.ensure_cache_shape();

        let donor_names: HashSet<String> =
            geometry.batches().iter().map(|b| b.name.clone()).collect();

        if let Some(region) = &region {
            let count = self.skin.as_ref().map_or(0, Geometry::batch_count);
            for index in (0..count).rev() {
                let replace = self
                    .skin
                    .as_ref()
                    .and_then(|s| s.batch(index))
                    .is_some_and(|b| {
                        b.skin_region.as_deref() == Some(region.as_str())
                            && !donor_names.contains(&b.name)
                    });
                if replace {
                    self.remove_batch(index)?;
                }
            }
        }

        let skin = self.skin.as_mut().ok_or(SkinError::NoSkin)?;
        let mut donor_cache = donor_cache.into_iter();
        let mut added = 0;
        for mut batch in geometry.into_batches() {
            let slots = donor_cache.next().unwrap_or_default();
            let retained = region.is_some() && skin.batches().iter().any(|b| b.name == batch.name);
            if retained {
                continue;
            }
            if region.is_some() {
                batch.skin_region = region.clone();
            }
            skin.add_batch(batch);
            self.cache.push(slots);
            added += 1;
        }
        self.ensure_cache_shape();

        if self.binding.is_some() {
            self.new_skeleton_assigned = true;
        }
        self.refresh.mark();
        tracing::debug!(target: "skin", "{}: assimilated {} batch(es)", self.name, added);
        Ok(added)
    }
}
