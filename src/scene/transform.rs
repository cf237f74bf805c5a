//! 空间变换
//!
//! 平移 / 旋转 / 缩放 (TRS) 三元组，骨骼的局部姿态与世界姿态都用它表示。

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// TRS 变换
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::identity()
        }
    }

    /// 转换为 4x4 矩阵
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从 4x4 矩阵分解
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// 线性插值（旋转使用球面线性插值）
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// 父变换与子变换组合，得到子节点的世界变换
    ///
    /// 缩放逐分量相乘，旋转相乘，平移先经父缩放、父旋转再加上父平移。
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.rotation * (self.scale * child.translation) + self.translation,
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }

    /// 变换一个点
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.translation
    }

    /// 近似相等比较
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_identity() {
        let t = Transform::identity();
        assert_eq!(t.translation, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
    }

    #[test]
    fn test_transform_to_matrix() {
        let t = Transform::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, Vec3::ONE);
        let m = t.to_matrix();
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_matrix_round_trip() {
        let t = Transform::new(
            Vec3::new(1.0, -2.0, 0.5),
            Quat::from_rotation_y(0.7),
            Vec3::ONE,
        );
        let back = Transform::from_matrix(t.to_matrix());
        assert!(t.abs_diff_eq(&back, 1e-5));
    }

    #[test]
    fn test_mul_transform_matches_matrix_product() {
        let parent = Transform::new(
            Vec3::new(0.0, 1.0, 0.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let child = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let world = parent.mul_transform(&child);

        let expected = parent.to_matrix() * child.to_matrix();
        assert!(world
            .translation
            .abs_diff_eq(expected.w_axis.truncate(), 1e-5));
        assert!(world.translation.abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-5));
    }

    #[test]
    fn test_lerp_halfway() {
        let a = Transform::identity();
        let b = Transform::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let mid = a.lerp(&b, 0.5);
        assert!((mid.translation.x - 5.0).abs() < 0.001);
    }
}
