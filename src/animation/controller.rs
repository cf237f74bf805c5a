//! 动画控制器
//!
//! 挂在骨骼上，持有一组动画并驱动其中一个（活动动画）播放。

use serde::{Deserialize, Serialize};

use super::bone_animation::{AnimationId, BoneAnimation};
use super::events::{AnimationEvent, AnimationEventTable, EventContext};
use super::skeleton::Skeleton;
use super::RepeatType;
use crate::config::AnimationConfig;
use crate::core::AnimationResult;

fn default_speed() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

/// 动画控制器
#[derive(Debug, Serialize, Deserialize)]
pub struct AnimationController {
    #[serde(default)]
    animation_sets: Vec<BoneAnimation>,
    #[serde(default)]
    active_animation: Option<usize>,
    #[serde(default)]
    repeat_type: RepeatType,
    #[serde(default = "default_speed")]
    speed: f32,
    #[serde(default = "default_true")]
    active: bool,
    #[serde(skip)]
    skeleton_root: Option<usize>,
    #[serde(skip)]
    needs_binding: bool,
    #[serde(skip)]
    events: AnimationEventTable,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationController {
    pub fn new() -> Self {
        Self {
            animation_sets: Vec::new(),
            active_animation: None,
            repeat_type: RepeatType::Clamp,
            speed: 1.0,
            active: true,
            skeleton_root: None,
            needs_binding: false,
            events: AnimationEventTable::new(),
        }
    }

    /// 按配置创建控制器
    pub fn from_config(config: &AnimationConfig) -> Self {
        Self {
            repeat_type: config.default_repeat,
            speed: config.default_speed,
            ..Self::new()
        }
    }

    // ===== 动画集合 =====

    /// 添加动画，骨骼绑定推迟到下一次更新
    pub fn add_animation(&mut self, animation: BoneAnimation) -> AnimationId {
        let id = animation.id();
        self.animation_sets.push(animation);
        self.needs_binding = true;
        id
    }

    pub fn remove_animation(&mut self, id: AnimationId) -> Option<BoneAnimation> {
        let index = self.animation_sets.iter().position(|a| a.id() == id)?;
        self.remove_animation_at(index)
    }

    /// 按下标移除动画
    ///
    /// 移除的是活动动画时，活动动画改为第一个剩余动画（没有剩余则清空）。
    pub fn remove_animation_at(&mut self, index: usize) -> Option<BoneAnimation> {
        if index >= self.animation_sets.len() {
            return None;
        }
        let removed = self.animation_sets.remove(index);
        self.events.remove_animation(removed.id());
        self.active_animation = match self.active_animation {
            _ if self.animation_sets.is_empty() => None,
            Some(active) if active == index => Some(0),
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        Some(removed)
    }

    pub fn clear_animations(&mut self) {
        self.animation_sets.clear();
        self.active_animation = None;
        self.events.clear();
    }

    pub fn animations(&self) -> &[BoneAnimation] {
        &self.animation_sets
    }

    pub fn animation(&self, index: usize) -> Option<&BoneAnimation> {
        self.animation_sets.get(index)
    }

    pub fn animation_mut(&mut self, index: usize) -> Option<&mut BoneAnimation> {
        self.animation_sets.get_mut(index)
    }

    pub fn animation_by_name(&self, name: &str) -> Option<&BoneAnimation> {
        self.animation_sets.iter().find(|a| a.name() == name)
    }

    pub fn animation_count(&self) -> usize {
        self.animation_sets.len()
    }

    // ===== 活动动画 =====

    pub fn active_animation(&self) -> Option<&BoneAnimation> {
        self.animation_sets.get(self.active_animation?)
    }

    pub fn active_animation_mut(&mut self) -> Option<&mut BoneAnimation> {
        self.animation_sets.get_mut(self.active_animation?)
    }

    pub fn active_animation_index(&self) -> Option<usize> {
        self.active_animation
    }

    /// 按名称切换活动动画，找不到时清空活动动画
    pub fn set_active_animation(&mut self, name: &str) -> bool {
        self.active_animation = self.animation_sets.iter().position(|a| a.name() == name);
        if self.active_animation.is_none() {
            tracing::warn!(target: "animation", "Animation '{}' not found, clearing active animation", name);
        }
        self.active_animation.is_some()
    }

    /// 按下标切换活动动画，越界时清空活动动画
    pub fn set_active_animation_index(&mut self, index: usize) -> bool {
        self.active_animation = (index < self.animation_sets.len()).then_some(index);
        self.active_animation.is_some()
    }

    pub fn set_active_animation_by_id(&mut self, id: AnimationId) -> bool {
        self.active_animation = self.animation_sets.iter().position(|a| a.id() == id);
        self.active_animation.is_some()
    }

    pub fn clear_active_animation(&mut self) {
        self.active_animation = None;
    }

    // ===== 播放参数 =====

    pub fn repeat_type(&self) -> RepeatType {
        self.repeat_type
    }

    pub fn set_repeat_type(&mut self, repeat_type: RepeatType) {
        self.repeat_type = repeat_type;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    // ===== 事件 =====

    pub fn events(&self) -> &AnimationEventTable {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut AnimationEventTable {
        &mut self.events
    }

    pub fn add_event(
        &mut self,
        animation: AnimationId,
        frame: usize,
        event: impl AnimationEvent + 'static,
    ) {
        self.events.add_animation_event(animation, frame, event);
    }

    pub fn on_frame<F>(&mut self, animation: AnimationId, frame: usize, f: F)
    where
        F: FnMut(&EventContext<'_>) + Send + Sync + 'static,
    {
        self.events.on_frame(animation, frame, f);
    }

    // ===== 骨骼 =====

    pub fn skeleton_root(&self) -> Option<usize> {
        self.skeleton_root
    }

    /// 把所有动画绑定到以 `root` 为根的子树，返回是否全部解析成功
    pub fn bind_skeleton(&mut self, skeleton: &Skeleton, root: usize) -> bool {
        self.skeleton_root = Some(root);
        self.needs_binding = false;
        self.animation_sets
            .iter_mut()
            .fold(true, |ok, animation| animation.assign_skeleton(skeleton, root) && ok)
    }

    /// 跳到活动动画的指定帧
    pub fn set_current_frame(&mut self, frame: usize, skeleton: &mut Skeleton) -> AnimationResult<()> {
        match self.active_animation {
            Some(index) => {
                self.animation_sets[index].set_current_frame(frame, skeleton, &mut self.events)
            }
            None => Ok(()),
        }
    }

    /// 推进活动动画
    pub fn update(&mut self, time: f32, skeleton: &mut Skeleton) {
        if !self.active {
            return;
        }
        if self.needs_binding {
            if let Some(root) = self.skeleton_root {
                self.bind_skeleton(skeleton, root);
            }
        }
        if let Some(index) = self.active_animation {
            self.animation_sets[index].update(
                time,
                self.repeat_type,
                self.speed,
                skeleton,
                &mut self.events,
            );
        }
    }
}
