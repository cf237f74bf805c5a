//! 核心模块
//!
//! 包含整个骨骼动画管线共享的基础设施：
//! - `error` - 错误类型定义

pub mod error;

// 重新导出错误类型
pub use error::{
    AnimationError, AnimationResult, EngineError, EngineResult, SerializationError,
    SerializationResult, SkeletonError, SkeletonResult, SkinError, SkinResult,
};
