//! 场景数据
//!
//! 变换、蒙皮所用的几何体批次，以及蒙皮模型的保存与加载。

pub mod geometry;
pub mod serialization;
pub mod transform;

pub use geometry::{BoundingBox, GeomBatch, Geometry, VertMap};
pub use serialization::SkinnedModel;
pub use transform::Transform;
