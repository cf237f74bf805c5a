/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量和运行时动态调整
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod animation;
pub mod logging;

pub use animation::{AnimationConfig, SkinConfig};
pub use logging::{init_logging, LogLevel, LoggingConfig};

use crate::animation::RepeatType;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 蒙皮管线主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkinningConfig {
    /// 动画播放配置
    #[serde(default)]
    pub animation: AnimationConfig,

    /// 蒙皮配置
    #[serde(default)]
    pub skin: SkinConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SkinningConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SKINNING_DEFAULT_SPEED") {
            if let Ok(speed) = val.parse() {
                self.animation.default_speed = speed;
            }
        }
        if let Ok(val) = env::var("SKINNING_INTERPOLATION_RATE") {
            if let Ok(rate) = val.parse() {
                self.animation.interpolation_rate = rate;
            }
        }
        if let Ok(val) = env::var("SKINNING_REPEAT") {
            match val.to_ascii_lowercase().as_str() {
                "clamp" => self.animation.default_repeat = RepeatType::Clamp,
                "wrap" => self.animation.default_repeat = RepeatType::Wrap,
                "cycle" => self.animation.default_repeat = RepeatType::Cycle,
                other => {
                    tracing::warn!(target: "config", "Ignoring unknown SKINNING_REPEAT value: {}", other)
                }
            }
        }
        if let Ok(val) = env::var("SKINNING_RECALC_NORMALS") {
            self.skin.recalc_normals = val.parse().unwrap_or(self.skin.recalc_normals);
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.animation.validate()?;
        self.skin.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./skinning.toml
    /// 2. ./skinning.json
    /// 3. ~/.config/game_engine/skinning.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("skinning.toml") {
            tracing::info!(target: "config", "Loaded config from skinning.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("skinning.json") {
            tracing::info!(target: "config", "Loaded config from skinning.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("game_engine")
                .join("skinning.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default skinning configuration");
        Self::default()
    }
}
