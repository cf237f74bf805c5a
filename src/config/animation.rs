/// 动画与蒙皮配置

use serde::{Deserialize, Serialize};
use super::{ConfigError, ConfigResult};
use crate::animation::RepeatType;

/// 动画播放配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// 控制器默认的循环模式
    pub default_repeat: RepeatType,

    /// 默认播放速度 (1.0 = 正常速度)
    pub default_speed: f32,

    /// 插值采样间隔 (秒)，0 表示每次更新都采样
    pub interpolation_rate: f32,

    /// 是否在关键帧之间插值
    pub interpolate: bool,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            default_repeat: RepeatType::Clamp,
            default_speed: 1.0,
            interpolation_rate: crate::animation::DEFAULT_INTERPOLATION_RATE,
            interpolate: true,
        }
    }
}

impl AnimationConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.default_speed.is_finite() {
            return Err(ConfigError::ValidationError("Invalid default speed".to_string()));
        }
        if !self.interpolation_rate.is_finite() || self.interpolation_rate < 0.0 {
            return Err(ConfigError::ValidationError(
                "Invalid interpolation rate".to_string(),
            ));
        }
        Ok(())
    }
}

/// 蒙皮配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkinConfig {
    /// 每次蒙皮后是否重新计算包围盒
    pub recalc_bounds: bool,

    /// 是否同时变形法线
    pub recalc_normals: bool,
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            recalc_bounds: true,
            recalc_normals: true,
        }
    }
}

impl SkinConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}
