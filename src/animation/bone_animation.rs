//! 关键帧骨骼动画
//!
//! 一段动画由关键帧时间表和若干骨骼轨道组成，可以嵌套子动画。
//! 播放游标由 `prev_frame` / `current_frame` 两个相邻关键帧和当前时间构成。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::bone_transform::BoneTransform;
use super::events::AnimationEventTable;
use super::skeleton::Skeleton;
use super::{RepeatType, DEFAULT_INTERPOLATION_RATE};
use crate::config::AnimationConfig;
use crate::core::{AnimationError, AnimationResult};

/// 动画实例标识（运行时分配，用于登记帧事件）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(u64);

impl AnimationId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// 关键帧区间的插值方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationType {
    #[default]
    Linear,
    /// 保留的曲线插值，当前按区间起始帧取值
    Bezier,
}

fn default_current_frame() -> usize {
    1
}

fn default_interpolation_rate() -> f32 {
    DEFAULT_INTERPOLATION_RATE
}

fn default_cycle_mode() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

/// 关键帧骨骼动画
///
/// 插值方式表不参与序列化，加载后的动画一律按线性插值播放。
#[derive(Debug, Serialize, Deserialize)]
pub struct BoneAnimation {
    #[serde(skip, default = "AnimationId::next")]
    id: AnimationId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    keyframe_time: Vec<f32>,
    #[serde(skip)]
    interpolation_type: Vec<InterpolationType>,
    #[serde(default)]
    bone_transforms: Vec<BoneTransform>,
    #[serde(default)]
    current_time: f32,
    #[serde(default = "default_current_frame")]
    current_frame: usize,
    #[serde(default)]
    prev_frame: usize,
    #[serde(default)]
    start_frame: usize,
    #[serde(default)]
    end_frame: usize,
    #[serde(skip)]
    last_event_frame: Option<usize>,
    #[serde(default = "default_interpolation_rate")]
    interpolation_rate: f32,
    #[serde(default)]
    last_time: f32,
    #[serde(default = "default_cycle_mode")]
    cycle_mode: i32,
    #[serde(default = "default_true")]
    interpolate: bool,
    #[serde(default)]
    children: Vec<BoneAnimation>,
    #[serde(default)]
    sync_tags: HashMap<String, Vec<usize>>,
    #[serde(skip)]
    clamp_finished: bool,
}

impl Default for BoneAnimation {
    fn default() -> Self {
        Self::new("")
    }
}

impl BoneAnimation {
    /// 创建空动画
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: AnimationId::next(),
            name: name.into(),
            keyframe_time: Vec::new(),
            interpolation_type: Vec::new(),
            bone_transforms: Vec::new(),
            current_time: 0.0,
            current_frame: 1,
            prev_frame: 0,
            start_frame: 0,
            end_frame: 0,
            last_event_frame: None,
            interpolation_rate: DEFAULT_INTERPOLATION_RATE,
            last_time: 0.0,
            cycle_mode: 1,
            interpolate: true,
            children: Vec::new(),
            sync_tags: HashMap::new(),
            clamp_finished: false,
        }
    }

    /// 以给定关键帧时间创建动画，全部区间使用线性插值
    pub fn with_keyframes(name: impl Into<String>, times: Vec<f32>) -> Self {
        let mut animation = Self::new(name);
        animation.interpolation_type = vec![InterpolationType::Linear; times.len()];
        animation.set_times(times);
        animation
    }

    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // ===== 时间轴 =====

    pub fn keyframe_times(&self) -> &[f32] {
        &self.keyframe_time
    }

    /// 设置关键帧时间，播放区间重置为整条时间轴
    pub fn set_times(&mut self, times: Vec<f32>) {
        self.end_frame = times.len().saturating_sub(1);
        self.start_frame = 0;
        self.keyframe_time = times;
    }

    pub fn set_interpolation_types(&mut self, types: Vec<InterpolationType>) {
        self.interpolation_type = types;
    }

    pub fn interpolation_types(&self) -> &[InterpolationType] {
        &self.interpolation_type
    }

    /// 某区间的插值方式，未设置时为线性
    pub fn interpolation_type_at(&self, frame: usize) -> InterpolationType {
        self.interpolation_type
            .get(frame)
            .copied()
            .unwrap_or_default()
    }

    pub fn bone_transforms(&self) -> &[BoneTransform] {
        &self.bone_transforms
    }

    pub fn bone_transforms_mut(&mut self) -> &mut [BoneTransform] {
        &mut self.bone_transforms
    }

    pub fn add_bone_transform(&mut self, transform: BoneTransform) {
        self.bone_transforms.push(transform);
    }

    pub fn set_bone_transforms(&mut self, transforms: Vec<BoneTransform>) {
        self.bone_transforms = transforms;
    }

    pub fn children(&self) -> &[BoneAnimation] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [BoneAnimation] {
        &mut self.children
    }

    pub fn add_bone_animation(&mut self, child: BoneAnimation) {
        self.children.push(child);
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn subanimation_count(&self) -> usize {
        self.children.len()
    }

    pub fn subanimation(&self, index: usize) -> Option<&BoneAnimation> {
        self.children.get(index)
    }

    /// 时间轴与轨道是否都非空
    pub fn is_valid(&self) -> bool {
        !self.keyframe_time.is_empty() && !self.bone_transforms.is_empty()
    }

    /// 检查时间轴结构（递归检查子动画）
    pub fn validate(&self) -> AnimationResult<()> {
        let len = self.keyframe_time.len();
        let malformed = |reason: String| AnimationError::MalformedTimeline {
            animation: self.name.clone(),
            reason,
        };
        if self.keyframe_time.windows(2).any(|w| w[1] < w[0]) {
            return Err(malformed("keyframe times are not ascending".to_string()));
        }
        if !self.interpolation_type.is_empty() && self.interpolation_type.len() != len {
            return Err(malformed(format!(
                "{} interpolation types for {} keyframes",
                self.interpolation_type.len(),
                len
            )));
        }
        if let Some(track) = self
            .bone_transforms
            .iter()
            .find(|t| t.has_rotations() && t.transforms().len() != len)
        {
            return Err(malformed(format!(
                "track '{}' has {} keyframes, timeline has {}",
                track.bone_id().unwrap_or("?"),
                track.transforms().len(),
                len
            )));
        }
        if len > 0 && (self.start_frame > self.end_frame || self.end_frame >= len) {
            return Err(malformed(format!(
                "play range {}..={} does not fit {} keyframes",
                self.start_frame, self.end_frame, len
            )));
        }
        self.children.iter().try_for_each(BoneAnimation::validate)
    }

    fn invalid_frame(&self, frame: usize) -> AnimationError {
        tracing::error!(
            target: "animation",
            "{}: invalid frame index ({}), timeline only has {} keyframes",
            self.name,
            frame,
            self.keyframe_time.len()
        );
        AnimationError::InvalidFrame {
            animation: self.name.clone(),
            frame,
            keyframes: self.keyframe_time.len(),
        }
    }

    // ===== 播放游标 =====

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn prev_frame(&self) -> usize {
        self.prev_frame
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    pub fn end_frame(&self) -> usize {
        self.end_frame
    }

    /// 当前播放方向（CYCLE 模式下会在 1 与 -1 之间切换）
    pub fn cycle_mode(&self) -> i32 {
        self.cycle_mode
    }

    /// CLAMP 模式是否已播放完毕
    pub fn is_finished(&self) -> bool {
        self.clamp_finished
    }

    /// 设置整棵动画树的播放起始帧
    ///
    /// 任一带时间轴的节点放不下 `frame` 时返回错误，整棵树保持不变。
    pub fn set_start_frame(&mut self, frame: usize) -> AnimationResult<()> {
        self.check_frame(frame)?;
        self.for_each_timeline(&mut |animation| animation.start_frame = frame);
        Ok(())
    }

    /// 设置整棵动画树的播放结束帧，校验规则同 [`Self::set_start_frame`]
    pub fn set_end_frame(&mut self, frame: usize) -> AnimationResult<()> {
        self.check_frame(frame)?;
        self.for_each_timeline(&mut |animation| animation.end_frame = frame);
        Ok(())
    }

    /// 设置初始帧，游标区间向后展开；位于区间末尾时向前展开
    pub fn set_initial_frame(&mut self, frame: usize) -> AnimationResult<()> {
        self.check_frame(frame)?;
        self.for_each_timeline(&mut |animation| animation.place_cursor(frame));
        Ok(())
    }

    /// 没有时间轴的分组节点不参与校验
    fn check_frame(&self, frame: usize) -> AnimationResult<()> {
        if !self.keyframe_time.is_empty() && frame >= self.keyframe_time.len() {
            return Err(self.invalid_frame(frame));
        }
        self.children
            .iter()
            .try_for_each(|child| child.check_frame(frame))
    }

    fn for_each_timeline(&mut self, apply: &mut impl FnMut(&mut BoneAnimation)) {
        if !self.keyframe_time.is_empty() {
            apply(self);
        }
        for child in &mut self.children {
            child.for_each_timeline(apply);
        }
    }

    fn place_cursor(&mut self, frame: usize) {
        self.clamp_end_frame();
        if frame >= self.end_frame && frame > 0 {
            self.current_frame = frame;
            self.prev_frame = frame - 1;
        } else {
            self.prev_frame = frame;
            self.current_frame = frame + 1;
        }
        self.current_time = self
            .keyframe_time
            .get(self.current_frame.min(self.end_frame))
            .copied()
            .unwrap_or(0.0);
        self.clamp_finished = false;
    }

    /// 时间轴变短后，把越界的结束帧收回到最后一个关键帧
    fn clamp_end_frame(&mut self) {
        if let Some(last) = self.keyframe_time.len().checked_sub(1) {
            self.end_frame = self.end_frame.min(last);
        }
    }

    /// 立即跳到指定关键帧并写入骨骼姿态
    pub fn set_current_frame(
        &mut self,
        frame: usize,
        skeleton: &mut Skeleton,
        events: &mut AnimationEventTable,
    ) -> AnimationResult<()> {
        let mut result = Ok(());
        if self.prev_frame != frame && !self.keyframe_time.is_empty() {
            let len = self.keyframe_time.len();
            if frame >= len {
                return Err(self.invalid_frame(frame));
            }
            self.prev_frame = frame;
            self.current_frame = if frame + 1 < len { frame + 1 } else { self.start_frame };
            self.current_time = self.keyframe_time[frame];
            self.clamp_finished = false;
            for track in &mut self.bone_transforms {
                track.set_current_frame(frame, skeleton);
            }
            self.change_frame(frame, events);
        }
        for child in &mut self.children {
            if let Err(e) = child.set_current_frame(frame, skeleton, events) {
                result = Err(e);
            }
        }
        result
    }

    /// 回到播放区间起点
    pub fn reset(&mut self) {
        self.prev_frame = self.start_frame;
        self.current_frame = self.start_frame + 1;
        self.current_time = self
            .keyframe_time
            .get(self.start_frame)
            .copied()
            .unwrap_or(0.0);
        self.cycle_mode = 1;
        self.last_time = 0.0;
        self.last_event_frame = None;
        self.clamp_finished = false;
        for child in &mut self.children {
            child.reset();
        }
    }

    pub fn reset_current_time(&mut self) {
        self.current_time = 0.0;
        for child in &mut self.children {
            child.reset_current_time();
        }
    }

    // ===== 插值设置 =====

    pub fn interpolation_rate(&self) -> f32 {
        self.interpolation_rate
    }

    /// 两次插值写入之间的最小累计时间，0 表示每次更新都插值
    pub fn set_interpolation_rate(&mut self, rate: f32) {
        self.interpolation_rate = rate;
        for child in &mut self.children {
            child.set_interpolation_rate(rate);
        }
    }

    pub fn is_interpolate(&self) -> bool {
        self.interpolate
    }

    pub fn set_interpolate(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
        for child in &mut self.children {
            child.set_interpolate(interpolate);
        }
    }

    pub fn apply_config(&mut self, config: &AnimationConfig) {
        self.set_interpolation_rate(config.interpolation_rate);
        self.set_interpolate(config.interpolate);
    }

    // ===== 骨骼绑定 =====

    /// 在以 `root` 为根的子树内解析所有轨道的骨骼，返回是否全部解析成功
    pub fn assign_skeleton(&mut self, skeleton: &Skeleton, root: usize) -> bool {
        let mut resolved = true;
        for track in &mut self.bone_transforms {
            if !track.find_bone(skeleton, root) {
                tracing::warn!(
                    target: "animation",
                    "{}: bone '{}' not found under '{}'",
                    self.name,
                    track.bone_id().unwrap_or("?"),
                    skeleton.bone(root).map_or("?", |b| b.name())
                );
                resolved = false;
            }
        }
        for child in &mut self.children {
            resolved &= child.assign_skeleton(skeleton, root);
        }
        resolved
    }

    // ===== 更新 =====

    /// 推进动画并写入骨骼姿态
    pub fn update(
        &mut self,
        time: f32,
        repeat: RepeatType,
        speed: f32,
        skeleton: &mut Skeleton,
        events: &mut AnimationEventTable,
    ) {
        self.advance(time, repeat, speed, None, skeleton, events);
    }

    /// 推进动画，写入时按 `blend_rate` 与当前姿态混合
    pub fn update_blended(
        &mut self,
        time: f32,
        repeat: RepeatType,
        speed: f32,
        blend_rate: f32,
        skeleton: &mut Skeleton,
        events: &mut AnimationEventTable,
    ) {
        self.advance(time, repeat, speed, Some(blend_rate), skeleton, events);
    }

    fn advance(
        &mut self,
        time: f32,
        repeat: RepeatType,
        speed: f32,
        blend_rate: Option<f32>,
        skeleton: &mut Skeleton,
        events: &mut AnimationEventTable,
    ) {
        if self.is_valid() {
            self.clamp_end_frame();
            let old_frame = self.current_frame;
            if self.update_current_time(time, repeat, speed) {
                if self.interpolate {
                    self.last_time += time;
                    if self.last_time >= self.interpolation_rate {
                        self.last_time = if self.interpolation_rate > 0.0 {
                            self.last_time % self.interpolation_rate
                        } else {
                            0.0
                        };
                        self.apply_interpolated(blend_rate, skeleton);
                    }
                } else if blend_rate.is_some() || old_frame != self.current_frame {
                    let frame = self.current_frame;
                    for track in &mut self.bone_transforms {
                        match blend_rate {
                            Some(rate) => track.set_current_frame_blended(frame, rate, skeleton),
                            None => track.set_current_frame(frame, skeleton),
                        };
                    }
                }
            }
            self.change_frame(self.current_frame, events);
        }

        for child in &mut self.children {
            child.advance(time, repeat, speed, blend_rate, skeleton, events);
        }
    }

    fn apply_interpolated(&mut self, blend_rate: Option<f32>, skeleton: &mut Skeleton) {
        let prev = self.prev_frame;
        let current = self.current_frame;
        let start = self.keyframe_time[prev];
        let span = self.keyframe_time[current] - start;
        let t = if span.abs() > f32::EPSILON {
            ((self.current_time - start) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let interpolation = self.interpolation_type_at(prev);
        for track in &mut self.bone_transforms {
            match blend_rate {
                Some(rate) => track.update_blended(prev, current, interpolation, t, rate, skeleton),
                None => track.update(prev, current, interpolation, t, skeleton),
            }
        }
    }

    /// 按重复模式推进时间并定位关键帧区间，返回本次是否需要写入姿态
    fn update_current_time(&mut self, time: f32, repeat: RepeatType, speed: f32) -> bool {
        let (start, end) = (self.start_frame, self.end_frame);
        if start >= end || end >= self.keyframe_time.len() {
            return false;
        }
        let start_time = self.keyframe_time[start];
        let end_time = self.keyframe_time[end];
        let span = end_time - start_time;
        let delta = time * speed;

        match repeat {
            RepeatType::Clamp => {
                if self.clamp_finished {
                    return false;
                }
                self.current_time += delta;
                if self.current_time > end_time {
                    self.current_frame = end;
                    self.prev_frame = end - 1;
                    self.current_time = 0.0;
                    self.clamp_finished = true;
                    return false;
                }
            }
            RepeatType::Wrap => {
                self.current_time += delta;
                if span > 0.0 {
                    if self.current_time >= end_time || self.current_time < start_time {
                        self.current_time =
                            start_time + (self.current_time - start_time).rem_euclid(span);
                    }
                } else {
                    self.current_time = start_time;
                }
            }
            RepeatType::Cycle => {
                if span > 0.0 {
                    // 把往返运动展开成周期为 2 * span 的单向相位
                    let offset = (self.current_time - start_time).clamp(0.0, span);
                    let phase = if self.cycle_mode >= 0 {
                        offset
                    } else {
                        2.0 * span - offset
                    };
                    let phase = (phase + delta).rem_euclid(2.0 * span);
                    if phase <= span {
                        self.current_time = start_time + phase;
                        self.cycle_mode = 1;
                    } else {
                        self.current_time = start_time + 2.0 * span - phase;
                        self.cycle_mode = -1;
                    }
                } else {
                    self.current_time = start_time;
                }
            }
        }

        self.locate_frames();
        true
    }

    /// `current_frame` 取区间 (start, end] 内第一个时间大于当前时间的关键帧
    fn locate_frames(&mut self) {
        let mut current = self.start_frame + 1;
        while current < self.end_frame && self.current_time >= self.keyframe_time[current] {
            current += 1;
        }
        self.current_frame = current;
        self.prev_frame = current - 1;
    }

    fn change_frame(&mut self, frame: usize, events: &mut AnimationEventTable) {
        if self.last_event_frame != Some(frame) {
            events.fire(self.id, &self.name, frame);
            self.last_event_frame = Some(frame);
        }
    }

    // ===== 优化 =====

    /// 把时间轴相同（或自身没有时间轴）的叶子子动画合并进来
    ///
    /// 只迁移包含关键帧的轨道；`remove_children` 为真时合并后丢弃剩余子动画。
    pub fn optimize(&mut self, remove_children: bool) {
        if self.children.is_empty() {
            return;
        }
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].has_children() {
                self.children[i].optimize(remove_children);
                i += 1;
                continue;
            }
            if self.keyframe_time.is_empty() {
                let child = self.children.remove(i);
                self.keyframe_time = child.keyframe_time;
                self.interpolation_type = child.interpolation_type;
                self.start_frame = child.start_frame;
                self.end_frame = child.end_frame;
                self.absorb_tracks(child.bone_transforms);
            } else if self.keyframe_time == self.children[i].keyframe_time {
                let child = self.children.remove(i);
                self.absorb_tracks(child.bone_transforms);
            } else {
                i += 1;
            }
        }
        if remove_children {
            self.children.clear();
        }
    }

    fn absorb_tracks(&mut self, tracks: Vec<BoneTransform>) {
        self.bone_transforms
            .extend(tracks.into_iter().filter(BoneTransform::has_rotations));
    }

    // ===== 同步标签 =====

    /// 为一组帧添加同步标签
    pub fn add_sync(&mut self, name: impl Into<String>, frames: impl Into<Vec<usize>>) {
        let mut frames = frames.into();
        frames.sort_unstable();
        frames.dedup();
        self.sync_tags.insert(name.into(), frames);
    }

    pub fn sync_frames(&self, name: &str) -> Option<&[usize]> {
        self.sync_tags.get(name).map(Vec::as_slice)
    }

    pub fn contains_sync_tags(&self) -> bool {
        !self.sync_tags.is_empty()
    }

    /// 所有同步标签名（排序）
    pub fn all_sync_tags(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sync_tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 包含指定帧的同步标签名（排序）
    pub fn sync_names(&self, frame: usize) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .sync_tags
            .iter()
            .filter(|(_, frames)| frames.binary_search(&frame).is_ok())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn rig() -> (Skeleton, usize) {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_bone("root", None, Mat4::IDENTITY).unwrap();
        let arm = skeleton.add_bone("arm", Some(root), Mat4::IDENTITY).unwrap();
        (skeleton, arm)
    }

    /// arm 在每个关键帧上平移到 (frame, 0, 0)
    fn animation(times: Vec<f32>) -> BoneAnimation {
        let frames = (0..times.len())
            .map(|i| Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        let mut animation = BoneAnimation::with_keyframes("walk", times);
        animation.add_bone_transform(BoneTransform::with_transforms("arm", frames));
        animation.set_interpolation_rate(0.0);
        animation
    }

    fn arm_x(skeleton: &Skeleton, arm: usize) -> f32 {
        skeleton.bone(arm).unwrap().local_transform().translation.x
    }

    #[test]
    fn test_clamp_two_keyframes_interpolates() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0]);
        assert!(anim.assign_skeleton(&skeleton, 0));

        anim.update(0.5, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert!((arm_x(&skeleton, arm) - 0.5).abs() < 0.001);
        assert_eq!(anim.current_frame(), 1);
    }

    #[test]
    fn test_clamp_stops_at_end() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.assign_skeleton(&skeleton, 0);

        anim.update(1.9, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        let before = arm_x(&skeleton, arm);
        anim.update(0.5, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert_eq!(anim.current_frame(), anim.end_frame());
        assert_eq!(anim.current_time(), 0.0);
        assert!(anim.is_finished());

        anim.update(0.5, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert_eq!(anim.current_frame(), 2);
        assert_eq!(arm_x(&skeleton, arm), before);
    }

    #[test]
    fn test_wrap_restarts_from_start() {
        let (mut skeleton, _) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.assign_skeleton(&skeleton, 0);

        anim.update(2.25, RepeatType::Wrap, 1.0, &mut skeleton, &mut events);
        assert!((anim.current_time() - 0.25).abs() < 0.001);
        assert_eq!(anim.current_frame(), 1);
        assert_eq!(anim.prev_frame(), 0);
    }

    #[test]
    fn test_cycle_reverses_direction() {
        let (mut skeleton, _) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.assign_skeleton(&skeleton, 0);

        anim.update(2.5, RepeatType::Cycle, 1.0, &mut skeleton, &mut events);
        assert_eq!(anim.cycle_mode(), -1);
        assert!((anim.current_time() - 1.5).abs() < 0.001);

        anim.update(2.0, RepeatType::Cycle, 1.0, &mut skeleton, &mut events);
        assert_eq!(anim.cycle_mode(), 1);
        assert!((anim.current_time() - 0.5).abs() < 0.001);
        assert_eq!(anim.current_frame(), 1);
    }

    #[test]
    fn test_interpolation_rate_throttles_writes() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0]);
        anim.set_interpolation_rate(0.25);
        anim.assign_skeleton(&skeleton, 0);

        anim.update(0.1, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert_eq!(arm_x(&skeleton, arm), 0.0);
        anim.update(0.2, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert!((arm_x(&skeleton, arm) - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_non_interpolated_snaps_to_frame() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.set_interpolate(false);
        anim.assign_skeleton(&skeleton, 0);

        anim.update(1.2, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert_eq!(anim.current_frame(), 2);
        assert_eq!(arm_x(&skeleton, arm), 2.0);
    }

    #[test]
    fn test_set_current_frame_rejects_out_of_range() {
        let (mut skeleton, _) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.assign_skeleton(&skeleton, 0);

        let err = anim
            .set_current_frame(3, &mut skeleton, &mut events)
            .unwrap_err();
        assert!(matches!(err, AnimationError::InvalidFrame { frame: 3, .. }));
        assert_eq!(anim.prev_frame(), 0);
        assert_eq!(anim.current_frame(), 1);
    }

    #[test]
    fn test_set_current_frame_applies_pose() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.assign_skeleton(&skeleton, 0);

        anim.set_current_frame(2, &mut skeleton, &mut events).unwrap();
        assert_eq!(anim.prev_frame(), 2);
        assert_eq!(anim.current_frame(), 0);
        assert_eq!(anim.current_time(), 2.0);
        assert_eq!(arm_x(&skeleton, arm), 2.0);
    }

    #[test]
    fn test_events_fire_once_per_frame_entry() {
        let (mut skeleton, _) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0, 1.0, 2.0]);
        anim.assign_skeleton(&skeleton, 0);

        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        events.on_frame(anim.id(), 2, move |_ctx| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        anim.update(1.2, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        anim.update(0.1, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_optimize_merges_leaf_children() {
        let mut parent = BoneAnimation::new("parent");
        let mut child = BoneAnimation::with_keyframes("child", vec![0.0, 0.5, 1.0]);
        child.add_bone_transform(BoneTransform::new("arm", 3));
        child.add_bone_transform(BoneTransform::new("empty", 0));
        parent.add_bone_animation(child);

        parent.optimize(true);
        assert!(!parent.has_children());
        assert_eq!(parent.keyframe_times(), &[0.0, 0.5, 1.0]);
        assert_eq!(parent.end_frame(), 2);
        assert_eq!(parent.bone_transforms().len(), 1);
    }

    #[test]
    fn test_optimize_keeps_mismatched_timeline() {
        let mut parent = BoneAnimation::with_keyframes("parent", vec![0.0, 1.0]);
        let mut child = BoneAnimation::with_keyframes("child", vec![0.0, 2.0]);
        child.add_bone_transform(BoneTransform::new("arm", 2));
        parent.add_bone_animation(child);

        parent.optimize(false);
        assert_eq!(parent.children().len(), 1);
    }

    #[test]
    fn test_sync_tags() {
        let mut anim = animation(vec![0.0, 1.0, 2.0, 3.0]);
        anim.add_sync("left_foot", vec![2, 0]);
        anim.add_sync("right_foot", vec![1, 3]);

        assert_eq!(anim.sync_frames("left_foot"), Some(&[0, 2][..]));
        // 第 0 帧也必须能被找到
        assert_eq!(anim.sync_names(0), vec!["left_foot"]);
        assert_eq!(anim.sync_names(3), vec!["right_foot"]);
        assert!(anim.sync_names(5).is_empty());
        assert_eq!(anim.all_sync_tags(), vec!["left_foot", "right_foot"]);
    }

    #[test]
    fn test_validate() {
        let mut anim = animation(vec![0.0, 1.0]);
        assert!(anim.validate().is_ok());
        anim.add_bone_transform(BoneTransform::new("leg", 5));
        assert!(matches!(
            anim.validate(),
            Err(AnimationError::MalformedTimeline { .. })
        ));

        let descending = BoneAnimation::with_keyframes("bad", vec![1.0, 0.0]);
        assert!(descending.validate().is_err());
    }

    #[test]
    fn test_single_keyframe_is_inert() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim = animation(vec![0.0]);
        anim.assign_skeleton(&skeleton, 0);
        anim.update(1.0, RepeatType::Wrap, 1.0, &mut skeleton, &mut events);
        assert_eq!(arm_x(&skeleton, arm), 0.0);
    }

    #[test]
    fn test_children_advance_with_parent() {
        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut parent = BoneAnimation::new("layered");
        parent.add_bone_animation(animation(vec![0.0, 1.0]));
        parent.assign_skeleton(&skeleton, 0);

        parent.update(0.5, RepeatType::Clamp, 1.0, &mut skeleton, &mut events);
        assert!((arm_x(&skeleton, arm) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_frame_setters_reject_without_partial_update() {
        let mut parent = animation(vec![0.0, 1.0, 2.0]);
        let mut short = animation(vec![0.0, 1.0]);
        short.set_name("short");
        let mut long = animation(vec![0.0, 1.0, 2.0]);
        long.set_name("long");
        parent.add_bone_animation(short);
        parent.add_bone_animation(long);

        let err = parent.set_start_frame(2).unwrap_err();
        assert!(matches!(
            err,
            AnimationError::InvalidFrame { frame: 2, keyframes: 2, .. }
        ));
        assert!(parent.set_end_frame(2).is_err());
        assert!(parent.set_initial_frame(2).is_err());

        assert_eq!(parent.start_frame(), 0);
        assert_eq!(parent.end_frame(), 2);
        assert_eq!(parent.current_frame(), 1);
        let starts: Vec<_> = parent.children().iter().map(|c| c.start_frame()).collect();
        let ends: Vec<_> = parent.children().iter().map(|c| c.end_frame()).collect();
        assert_eq!(starts, vec![0, 0]);
        assert_eq!(ends, vec![1, 2]);
    }

    #[test]
    fn test_frame_bounds_reach_every_child() {
        let mut layered = BoneAnimation::new("layered");
        layered.add_bone_animation(animation(vec![0.0, 1.0, 2.0, 3.0]));
        layered.add_bone_animation(animation(vec![0.0, 0.5, 1.0, 1.5]));

        layered.set_start_frame(1).unwrap();
        layered.set_end_frame(3).unwrap();
        layered.set_initial_frame(1).unwrap();

        for child in layered.children() {
            assert_eq!((child.start_frame(), child.end_frame()), (1, 3));
            assert_eq!((child.prev_frame(), child.current_frame()), (1, 2));
        }
        assert_eq!(layered.children()[1].current_time(), 1.0);
    }

    #[test]
    fn test_sub_range_stays_inside_bounds() {
        for repeat in [RepeatType::Wrap, RepeatType::Cycle, RepeatType::Clamp] {
            let (mut skeleton, arm) = rig();
            let mut events = AnimationEventTable::new();
            let mut anim = animation(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
            anim.assign_skeleton(&skeleton, 0);
            anim.set_start_frame(1).unwrap();
            anim.set_end_frame(3).unwrap();
            anim.set_initial_frame(1).unwrap();

            for _ in 0..16 {
                anim.update(0.3, repeat, 1.0, &mut skeleton, &mut events);
                if anim.is_finished() {
                    break;
                }
                let time = anim.current_time();
                assert!((1.0..=3.0).contains(&time), "{repeat:?} left range at {time}");
                assert!((2..=3).contains(&anim.current_frame()));
                assert_eq!(anim.prev_frame() + 1, anim.current_frame());
                let x = arm_x(&skeleton, arm);
                assert!((1.0 - 1e-4..=3.0 + 1e-4).contains(&x));
            }
        }
    }

    #[test]
    fn test_loaded_stale_end_frame_is_clamped() {
        let mut json = serde_json::to_value(animation(vec![0.0, 1.0, 2.0])).unwrap();
        json["end_frame"] = serde_json::json!(7);

        let (mut skeleton, arm) = rig();
        let mut events = AnimationEventTable::new();
        let mut anim: BoneAnimation = serde_json::from_value(json.clone()).unwrap();
        anim.assign_skeleton(&skeleton, 0);
        anim.update(0.5, RepeatType::Wrap, 1.0, &mut skeleton, &mut events);
        assert_eq!(anim.end_frame(), 2);
        assert!((arm_x(&skeleton, arm) - 0.5).abs() < 0.001);

        let mut anim: BoneAnimation = serde_json::from_value(json).unwrap();
        anim.set_initial_frame(2).unwrap();
        assert_eq!(anim.end_frame(), 2);
        assert_eq!((anim.prev_frame(), anim.current_frame()), (1, 2));
        assert_eq!(anim.current_time(), 2.0);
    }
}
