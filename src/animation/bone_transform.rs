//! 单骨骼关键帧轨道

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::bone_animation::InterpolationType;
use super::skeleton::Skeleton;

/// 单根骨骼的关键帧轨道
///
/// 每个关键帧为一个局部变换矩阵，下标与所属动画的关键帧时间一一对应。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BoneTransform {
    #[serde(skip)]
    bone: Option<usize>,
    /// 目标骨骼名称
    #[serde(default)]
    bone_id: Option<String>,
    #[serde(default)]
    transforms: Vec<Mat4>,
    #[serde(skip)]
    old_frame: Option<usize>,
}

impl BoneTransform {
    /// 创建 `frames` 个单位矩阵关键帧
    pub fn new(bone_id: impl Into<String>, frames: usize) -> Self {
        Self::with_transforms(bone_id, vec![Mat4::IDENTITY; frames])
    }

    pub fn with_transforms(bone_id: impl Into<String>, transforms: Vec<Mat4>) -> Self {
        Self {
            bone: None,
            bone_id: Some(bone_id.into()),
            transforms,
            old_frame: None,
        }
    }

    /// 直接绑定到已存在的骨骼
    pub fn for_bone(skeleton: &Skeleton, bone: usize, transforms: Vec<Mat4>) -> Self {
        Self {
            bone: skeleton.bone(bone).map(|_| bone),
            bone_id: skeleton.bone(bone).map(|b| b.name.clone()),
            transforms,
            old_frame: None,
        }
    }

    pub fn bone(&self) -> Option<usize> {
        self.bone
    }

    pub fn set_bone(&mut self, bone: Option<usize>) {
        self.bone = bone;
    }

    pub fn bone_id(&self) -> Option<&str> {
        self.bone_id.as_deref()
    }

    pub fn set_bone_id(&mut self, bone_id: impl Into<String>) {
        self.bone_id = Some(bone_id.into());
    }

    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    pub fn set_transforms(&mut self, transforms: Vec<Mat4>) {
        self.transforms = transforms;
        self.old_frame = None;
    }

    pub fn set_transform(&mut self, index: usize, transform: Mat4) -> bool {
        match self.transforms.get_mut(index) {
            Some(slot) => {
                *slot = transform;
                true
            }
            None => false,
        }
    }

    /// 是否包含任何关键帧
    pub fn has_rotations(&self) -> bool {
        !self.transforms.is_empty()
    }

    /// 在以 `root` 为根的子树内按名称解析目标骨骼
    pub fn find_bone(&mut self, skeleton: &Skeleton, root: usize) -> bool {
        if let Some(id) = &self.bone_id {
            self.bone = skeleton.find_bone_in_subtree(root, id);
        }
        self.bone.is_some()
    }

    fn keyframe(&self, frame: usize) -> Option<(Quat, Vec3)> {
        self.transforms.get(frame).map(|m| {
            let (_, rotation, translation) = m.to_scale_rotation_translation();
            (rotation.normalize(), translation)
        })
    }

    /// 在两个关键帧之间插值
    ///
    /// 非线性插值类型直接取起始帧。
    pub fn interpolate(
        &self,
        prev: usize,
        current: usize,
        interpolation: InterpolationType,
        t: f32,
    ) -> Option<(Quat, Vec3)> {
        let (start_rot, start_trans) = self.keyframe(prev)?;
        let (end_rot, end_trans) = self.keyframe(current)?;
        match interpolation {
            InterpolationType::Linear => Some((
                start_rot.slerp(end_rot, t),
                start_trans.lerp(end_trans, t),
            )),
            InterpolationType::Bezier => Some((start_rot, start_trans)),
        }
    }

    /// 直接把骨骼设置到某一关键帧，帧未变化时跳过
    ///
    /// 返回是否写入了骨骼。
    pub fn set_current_frame(&mut self, frame: usize, skeleton: &mut Skeleton) -> bool {
        if self.old_frame == Some(frame) {
            return false;
        }
        let (Some(bone), Some((rotation, translation))) = (self.bone, self.keyframe(frame)) else {
            return false;
        };
        self.old_frame = Some(frame);
        skeleton.set_local_rotation(bone, rotation).is_ok()
            && skeleton.set_local_translation(bone, translation).is_ok()
    }

    /// 从骨骼当前姿态按 `blend_rate` 向目标关键帧靠拢
    pub fn set_current_frame_blended(
        &mut self,
        frame: usize,
        blend_rate: f32,
        skeleton: &mut Skeleton,
    ) -> bool {
        let (Some(bone), Some((rotation, translation))) = (self.bone, self.keyframe(frame)) else {
            return false;
        };
        self.old_frame = Some(frame);
        Self::blend_into(skeleton, bone, rotation, translation, blend_rate)
    }

    /// 在 `prev` 与 `current` 之间插值并写入骨骼局部变换
    pub fn update(
        &mut self,
        prev: usize,
        current: usize,
        interpolation: InterpolationType,
        t: f32,
        skeleton: &mut Skeleton,
    ) {
        let Some(bone) = self.bone else {
            return;
        };
        let Some((rotation, translation)) = self.interpolate(prev, current, interpolation, t)
        else {
            return;
        };
        if let Some(local) = skeleton.local_transform_mut(bone) {
            local.rotation = rotation;
            local.translation = translation;
            skeleton.propagate_bone_change(bone, true);
        }
    }

    /// 插值结果再按 `blend_rate` 与当前姿态混合
    pub fn update_blended(
        &mut self,
        prev: usize,
        current: usize,
        interpolation: InterpolationType,
        t: f32,
        blend_rate: f32,
        skeleton: &mut Skeleton,
    ) {
        let Some(bone) = self.bone else {
            return;
        };
        if let Some((rotation, translation)) = self.interpolate(prev, current, interpolation, t) {
            Self::blend_into(skeleton, bone, rotation, translation, blend_rate);
        }
    }

    fn blend_into(
        skeleton: &mut Skeleton,
        bone: usize,
        rotation: Quat,
        translation: Vec3,
        blend_rate: f32,
    ) -> bool {
        let Some(local) = skeleton.local_transform_mut(bone) else {
            return false;
        };
        local.rotation = local.rotation.slerp(rotation, blend_rate);
        local.translation = local.translation.lerp(translation, blend_rate);
        skeleton.propagate_bone_change(bone, true);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skeleton() -> (Skeleton, usize) {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_bone("root", None, Mat4::IDENTITY).unwrap();
        let arm = skeleton.add_bone("arm", Some(root), Mat4::IDENTITY).unwrap();
        skeleton.reset_change_values();
        (skeleton, arm)
    }

    fn track() -> BoneTransform {
        BoneTransform::with_transforms(
            "arm",
            vec![
                Mat4::IDENTITY,
                Mat4::from_rotation_translation(
                    Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                    Vec3::new(2.0, 0.0, 0.0),
                ),
            ],
        )
    }

    #[test]
    fn test_find_bone() {
        let (skeleton, arm) = skeleton();
        let mut t = track();
        assert!(t.find_bone(&skeleton, 0));
        assert_eq!(t.bone(), Some(arm));

        let mut missing = BoneTransform::new("tail", 2);
        assert!(!missing.find_bone(&skeleton, 0));
    }

    #[test]
    fn test_first_set_current_frame_writes() {
        let (mut skeleton, arm) = skeleton();
        let mut t = BoneTransform::for_bone(&skeleton, arm, track().transforms().to_vec());
        assert!(t.set_current_frame(0, &mut skeleton));
        assert!(skeleton.bone(arm).unwrap().bone_changed());
        // 同一帧第二次写入被跳过
        assert!(!t.set_current_frame(0, &mut skeleton));
        assert!(t.set_current_frame(1, &mut skeleton));
        let local = skeleton.bone(arm).unwrap().local_transform();
        assert!(local.translation.abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_out_of_range_frame_is_ignored() {
        let (mut skeleton, arm) = skeleton();
        let mut t = BoneTransform::for_bone(&skeleton, arm, track().transforms().to_vec());
        assert!(!t.set_current_frame(5, &mut skeleton));
        assert!(!skeleton.bone(arm).unwrap().bone_changed());
    }

    #[test]
    fn test_update_interpolates_and_propagates() {
        let (mut skeleton, arm) = skeleton();
        let mut t = track();
        t.find_bone(&skeleton, 0);
        t.update(0, 1, InterpolationType::Linear, 0.5, &mut skeleton);

        let local = skeleton.bone(arm).unwrap().local_transform();
        assert!((local.translation.x - 1.0).abs() < 0.001);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(local.rotation.abs_diff_eq(expected, 1e-4));
        assert!(skeleton.bone(0).unwrap().bone_changed());
    }

    #[test]
    fn test_bezier_snaps_to_start_frame() {
        let t = track();
        let (rotation, translation) = t
            .interpolate(0, 1, InterpolationType::Bezier, 0.75)
            .unwrap();
        assert_eq!(rotation, Quat::IDENTITY);
        assert_eq!(translation, Vec3::ZERO);
    }

    #[test]
    fn test_blended_update() {
        let (mut skeleton, arm) = skeleton();
        let mut t = track();
        t.find_bone(&skeleton, 0);
        t.update_blended(0, 1, InterpolationType::Linear, 1.0, 0.5, &mut skeleton);
        let local = skeleton.bone(arm).unwrap().local_transform();
        assert!((local.translation.x - 1.0).abs() < 0.001);
    }
}
