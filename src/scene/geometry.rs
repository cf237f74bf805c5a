//! 蒙皮几何数据
//!
//! 按批次 (batch) 组织的顶点 / 法线缓冲区。蒙皮节点直接读写这些缓冲区，
//! 并通过脏标记通知渲染器重新上传。

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// 轴对齐包围盒
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    /// 由点集计算包围盒，空点集返回 `None`
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self { min, max })
    }

    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// 几何批次
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeomBatch {
    /// 批次名称
    pub name: String,
    /// 皮肤区域（用于蒙皮数据移植时整体替换）
    #[serde(default)]
    pub skin_region: Option<String>,
    vertices: Vec<Vec3>,
    #[serde(default)]
    normals: Vec<Vec3>,
    #[serde(default)]
    indices: Vec<u32>,
    #[serde(skip)]
    dirty_vertices: bool,
    #[serde(skip)]
    model_bound: Option<BoundingBox>,
}

impl GeomBatch {
    pub fn new(name: impl Into<String>, vertices: Vec<Vec3>, normals: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            skin_region: None,
            vertices,
            normals,
            indices: Vec::new(),
            dirty_vertices: true,
            model_bound: None,
        }
    }

    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    pub fn with_skin_region(mut self, region: impl Into<String>) -> Self {
        self.skin_region = Some(region.into());
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// 可写顶点缓冲区；调用者负责设置脏标记
    pub fn vertices_mut(&mut self) -> &mut [Vec3] {
        &mut self.vertices
    }

    /// 可写法线缓冲区；调用者负责设置脏标记
    pub fn normals_mut(&mut self) -> &mut [Vec3] {
        &mut self.normals
    }

    /// 同时借出顶点与法线缓冲区
    pub fn buffers_mut(&mut self) -> (&mut [Vec3], &mut [Vec3]) {
        (&mut self.vertices, &mut self.normals)
    }

    pub fn has_dirty_vertices(&self) -> bool {
        self.dirty_vertices
    }

    pub fn set_has_dirty_vertices(&mut self, dirty: bool) {
        self.dirty_vertices = dirty;
    }

    /// 重新计算模型空间包围盒
    pub fn update_model_bound(&mut self) {
        self.model_bound = BoundingBox::from_points(&self.vertices);
    }

    pub fn model_bound(&self) -> Option<BoundingBox> {
        self.model_bound
    }

    /// 顶点缓冲区字节视图，供渲染器上传
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// 法线缓冲区字节视图，供渲染器上传
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }
}

/// 蒙皮几何体
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Geometry {
    /// 几何体名称
    pub name: String,
    batches: Vec<GeomBatch>,
}

impl Geometry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: Vec::new(),
        }
    }

    pub fn with_batch(mut self, batch: GeomBatch) -> Self {
        self.batches.push(batch);
        self
    }

    pub fn add_batch(&mut self, batch: GeomBatch) -> usize {
        self.batches.push(batch);
        self.batches.len() - 1
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn batch(&self, index: usize) -> Option<&GeomBatch> {
        self.batches.get(index)
    }

    pub fn batch_mut(&mut self, index: usize) -> Option<&mut GeomBatch> {
        self.batches.get_mut(index)
    }

    pub fn batches(&self) -> &[GeomBatch] {
        &self.batches
    }

    pub fn remove_batch(&mut self, index: usize) -> Option<GeomBatch> {
        (index < self.batches.len()).then(|| self.batches.remove(index))
    }

    pub fn swap_batches(&mut self, a: usize, b: usize) {
        self.batches.swap(a, b);
    }

    pub fn into_batches(self) -> Vec<GeomBatch> {
        self.batches
    }

    /// 重新计算所有批次的包围盒
    pub fn update_model_bound(&mut self) {
        for batch in &mut self.batches {
            batch.update_model_bound();
        }
    }

    /// 所有批次包围盒的并集
    pub fn model_bound(&self) -> Option<BoundingBox> {
        self.batches
            .iter()
            .filter_map(|b| b.model_bound())
            .reduce(|a, b| a.merge(&b))
    }
}

/// 顶点重映射表（旧索引 -> 新索引）
///
/// 由外部网格优化（顶点合并、重排）产生。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertMap {
    old_to_new: Vec<usize>,
}

impl VertMap {
    pub fn new(old_to_new: Vec<usize>) -> Self {
        Self { old_to_new }
    }

    pub fn identity(count: usize) -> Self {
        Self {
            old_to_new: (0..count).collect(),
        }
    }

    /// 旧索引对应的新索引；越界时原样返回
    pub fn new_index(&self, old: usize) -> usize {
        self.old_to_new.get(old).copied().unwrap_or(old)
    }

    pub fn len(&self) -> usize {
        self.old_to_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old_to_new.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> GeomBatch {
        GeomBatch::new(
            "quad",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 2.0, 0.0),
                Vec3::new(0.0, 2.0, -1.0),
            ],
            vec![Vec3::Z; 4],
        )
        .with_indices(vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn test_model_bound() {
        let mut batch = quad();
        assert!(batch.model_bound().is_none());
        batch.update_model_bound();
        let bound = batch.model_bound().unwrap();
        assert_eq!(bound.min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(bound.max, Vec3::new(1.0, 2.0, 0.0));
        assert!(bound.contains(Vec3::new(0.5, 1.0, -0.5)));
    }

    #[test]
    fn test_geometry_bound_merges_batches() {
        let mut geometry = Geometry::new("mesh").with_batch(quad()).with_batch(GeomBatch::new(
            "far",
            vec![Vec3::new(5.0, 5.0, 5.0)],
            vec![Vec3::Y],
        ));
        geometry.update_model_bound();
        let bound = geometry.model_bound().unwrap();
        assert_eq!(bound.max, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_vertex_bytes_layout() {
        let batch = quad();
        assert_eq!(batch.vertex_bytes().len(), 4 * 3 * std::mem::size_of::<f32>());
    }

    #[test]
    fn test_remove_and_swap_batches() {
        let mut geometry = Geometry::new("mesh")
            .with_batch(GeomBatch::new("a", vec![Vec3::ZERO], vec![]))
            .with_batch(GeomBatch::new("b", vec![Vec3::ZERO; 2], vec![]));
        geometry.swap_batches(0, 1);
        assert_eq!(geometry.batch(0).unwrap().name, "b");
        assert!(geometry.remove_batch(5).is_none());
        assert_eq!(geometry.remove_batch(0).unwrap().name, "b");
        assert_eq!(geometry.batch_count(), 1);
    }

    #[test]
    fn test_vert_map() {
        let map = VertMap::new(vec![2, 0, 1]);
        assert_eq!(map.new_index(0), 2);
        assert_eq!(map.new_index(2), 1);
        assert_eq!(map.new_index(10), 10);
        assert_eq!(VertMap::identity(3).new_index(1), 1);
    }
}
