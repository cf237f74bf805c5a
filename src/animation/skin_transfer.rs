//! 蒙皮移植节点
//!
//! 只携带几何体和按名称引用骨骼的影响量，不绑定骨架，
//! 唯一用途是被 [`SkinNode::assimilate`](super::skin::SkinNode::assimilate) 吸收。

use glam::Mat4;
use serde::{Deserialize, Serialize};

use super::influence::BoneInfluence;
use super::skeleton::Skeleton;
use super::skin::{InfluenceCache, SkinNode};
use crate::core::{SkinError, SkinResult};
use crate::scene::{Geometry, VertMap};

/// 蒙皮移植节点
#[derive(Debug, Serialize, Deserialize)]
pub struct SkinTransferNode {
    inner: SkinNode,
    /// 所有批次共享的皮肤区域
    #[serde(default)]
    skin_region: Option<String>,
}

fn restricted<T>(operation: &'static str) -> SkinResult<T> {
    tracing::warn!(target: "skin", "'{}' is not available on a SkinTransferNode", operation);
    Err(SkinError::RestrictedOperation { operation })
}

impl SkinTransferNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: SkinNode::new(name),
            skin_region: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn skin_region(&self) -> Option<&str> {
        self.skin_region.as_deref()
    }

    pub fn set_skin_region(&mut self, skin_region: Option<String>) {
        self.skin_region = skin_region;
    }

    pub fn skin(&self) -> Option<&Geometry> {
        self.inner.skin()
    }

    pub fn set_skin(&mut self, skin: Geometry) {
        self.inner.set_skin(skin);
    }

    pub fn set_bind_matrix(&mut self, bind_matrix: Mat4) {
        self.inner.set_bind_matrix(bind_matrix);
    }

    pub fn add_bone_influence_by_id(
        &mut self,
        batch: usize,
        vertex: usize,
        bone_id: impl Into<String>,
        weight: f32,
    ) -> SkinResult<()> {
        self.inner.add_bone_influence_by_id(batch, vertex, bone_id, weight)
    }

    pub fn influences(&self, batch: usize, vertex: usize) -> &[BoneInfluence] {
        self.inner.influences(batch, vertex)
    }

    /// 是否包含指定名称的批次；给定区域时还要求区域一致
    pub fn has_skin_geometry(&self, name: &str, match_skin_region: Option<&str>) -> bool {
        if let Some(region) = match_skin_region {
            if self.skin_region.as_deref() != Some(region) {
                return false;
            }
        }
        self.inner
            .skin()
            .is_some_and(|skin| skin.batches().iter().any(|b| b.name == name))
    }

    pub(crate) fn into_parts(self) -> (Option<Geometry>, InfluenceCache, Option<String>) {
        let (skin, cache) = self.inner.into_skin_and_cache();
        (skin, cache, self.skin_region)
    }

    // ===== 受限操作 =====

    pub fn add_bone_influence(
        &mut self,
        _batch: usize,
        _vertex: usize,
        _skeleton: &Skeleton,
        _bone: usize,
        _weight: f32,
    ) -> SkinResult<()> {
        restricted("add_bone_influence")
    }

    pub fn set_skeleton(&mut self, _skeleton: &mut Skeleton, _root: usize) -> SkinResult<()> {
        restricted("set_skeleton")
    }

    pub fn set_animation(&mut self, _skeleton: &mut Skeleton, _name: &str) -> SkinResult<()> {
        restricted("set_animation")
    }

    pub fn assign_skeleton_bone_influences(&mut self, _skeleton: &Skeleton) -> SkinResult<()> {
        restricted("assign_skeleton_bone_influences")
    }

    pub fn regen_influence_offsets(&mut self, _skeleton: &Skeleton) -> SkinResult<()> {
        restricted("regen_influence_offsets")
    }

    pub fn update_skin(&mut self, _skeleton: &Skeleton) -> SkinResult<()> {
        restricted("update_skin")
    }

    pub fn remap_influences(&mut self, _mappings: &[VertMap]) -> SkinResult<()> {
        restricted("remap_influences")
    }

    pub fn assimilate(&mut self, _donor: SkinTransferNode) -> SkinResult<usize> {
        restricted("assimilate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GeomBatch;
    use glam::Vec3;

    fn donor() -> SkinTransferNode {
        let mut node = SkinTransferNode::new("gloves");
        node.set_skin_region(Some("hands".to_string()));
        node.set_skin(Geometry::new("gloves").with_batch(GeomBatch::new(
            "left_glove",
            vec![Vec3::ZERO, Vec3::X],
            vec![],
        )));
        node
    }

    #[test]
    fn test_allowed_operations() {
        let mut node = donor();
        node.add_bone_influence_by_id(0, 1, "hand_l", 1.0).unwrap();
        node.set_bind_matrix(Mat4::IDENTITY);
        assert_eq!(node.influences(0, 1)[0].bone_id, "hand_l");
    }

    #[test]
    fn test_restricted_operations() {
        let mut node = donor();
        let mut skeleton = Skeleton::new();
        let root = skeleton.add_bone("root", None, Mat4::IDENTITY).unwrap();

        assert_eq!(
            node.set_skeleton(&mut skeleton, root),
            Err(SkinError::RestrictedOperation {
                operation: "set_skeleton"
            })
        );
        assert!(node.add_bone_influence(0, 0, &skeleton, root, 1.0).is_err());
        assert!(node.update_skin(&skeleton).is_err());
        assert!(node.set_animation(&mut skeleton, "walk").is_err());
        assert!(node.remap_influences(&[]).is_err());
        assert!(node.assimilate(donor()).is_err());
        // 受限节点没有注册任何监听者
        assert_eq!(skeleton.bone(root).unwrap().listener_count(), 0);
    }

    #[test]
    fn test_has_skin_geometry() {
        let node = donor();
        assert!(node.has_skin_geometry("left_glove", None));
        assert!(node.has_skin_geometry("left_glove", Some("hands")));
        assert!(!node.has_skin_geometry("left_glove", Some("feet")));
        assert!(!node.has_skin_geometry("right_glove", None));
    }
}
