//! 骨骼影响量

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::skeleton::Skeleton;

/// 单根骨骼对单个顶点的加权影响
///
/// 骨骼引用在加载后按 `bone_id` 延迟解析；偏移量由蒙皮节点在绑定时计算。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoneInfluence {
    #[serde(skip)]
    bone: Option<usize>,
    /// 骨骼名称
    pub bone_id: String,
    /// 权重
    pub weight: f32,
    #[serde(skip)]
    v_offset: Option<Vec3>,
    #[serde(skip)]
    n_offset: Option<Vec3>,
}

/// 同一顶点上的影响量按骨骼名称去重
impl PartialEq for BoneInfluence {
    fn eq(&self, other: &Self) -> bool {
        self.bone_id == other.bone_id
    }
}

impl BoneInfluence {
    /// 仅按名称引用骨骼，绑定时再解析
    pub fn new(bone_id: impl Into<String>, weight: f32) -> Self {
        Self {
            bone: None,
            bone_id: bone_id.into(),
            weight,
            v_offset: None,
            n_offset: None,
        }
    }

    /// 直接引用已解析的骨骼
    pub fn with_bone(bone: usize, bone_id: impl Into<String>, weight: f32) -> Self {
        Self {
            bone: Some(bone),
            ..Self::new(bone_id, weight)
        }
    }

    pub fn bone(&self) -> Option<usize> {
        self.bone
    }

    pub fn set_bone(&mut self, bone: Option<usize>) {
        self.bone = bone;
    }

    pub fn v_offset(&self) -> Option<Vec3> {
        self.v_offset
    }

    pub fn n_offset(&self) -> Option<Vec3> {
        self.n_offset
    }

    pub(crate) fn set_offsets(&mut self, v_offset: Option<Vec3>, n_offset: Option<Vec3>) {
        self.v_offset = v_offset;
        self.n_offset = n_offset;
    }

    /// 在以 `root` 为根的子树内按名称解析骨骼
    pub fn assign_bone(&mut self, skeleton: &Skeleton, root: usize) -> bool {
        self.bone = skeleton.find_bone_in_subtree(root, &self.bone_id);
        self.bone.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    #[test]
    fn test_equality_by_bone_id() {
        let a = BoneInfluence::new("spine", 0.2);
        let b = BoneInfluence::with_bone(3, "spine", 0.8);
        assert_eq!(a, b);
        assert_ne!(a, BoneInfluence::new("head", 0.2));
    }

    #[test]
    fn test_assign_bone_within_subtree() {
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_bone("root", None, Mat4::IDENTITY).unwrap();
        let other = skeleton.add_bone("other_root", None, Mat4::IDENTITY).unwrap();
        skeleton.add_bone("hand", Some(root), Mat4::IDENTITY).unwrap();

        let mut influence = BoneInfluence::new("hand", 1.0);
        assert!(influence.assign_bone(&skeleton, root));
        assert_eq!(influence.bone(), Some(2));

        assert!(!influence.assign_bone(&skeleton, other));
        assert_eq!(influence.bone(), None);
    }

    #[test]
    fn test_offsets_not_serialized() {
        let mut influence = BoneInfluence::with_bone(1, "arm", 0.5);
        influence.set_offsets(Some(Vec3::X), None);
        let json = serde_json::to_string(&influence).unwrap();
        let loaded: BoneInfluence = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.bone_id, "arm");
        assert_eq!(loaded.weight, 0.5);
        assert!(loaded.bone().is_none());
        assert!(loaded.v_offset().is_none());
    }
}
