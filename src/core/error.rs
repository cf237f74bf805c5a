//! 统一错误处理模块
//!
//! 提供骨骼动画与蒙皮管线的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **骨骼错误** (`SkeletonError`): 骨骼层级构建错误（父节点、索引、重名等）
//! - **动画错误** (`AnimationError`): 时间轴索引越界与时间轴结构不合法
//! - **蒙皮错误** (`SkinError`): 缓存越界、受限节点上的非法操作
//! - **序列化错误** (`SerializationError`): JSON / 二进制读写失败
//!
//! `EngineError` 可以同时承载以上所有错误。

use thiserror::Error;

/// 引擎核心错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Skeleton error: {0}")]
    Skeleton(#[from] SkeletonError),

    #[error("Animation error: {0}")]
    Animation(#[from] AnimationError),

    #[error("Skin error: {0}")]
    Skin(#[from] SkinError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("General error: {0}")]
    General(String),
}

/// 骨骼层级错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkeletonError {
    #[error("Bone index out of range: {index} (skeleton has {count} bones)")]
    BoneOutOfRange { index: usize, count: usize },

    #[error("Invalid parent index {parent} for bone '{bone}'")]
    InvalidParent { bone: String, parent: usize },

    #[error("Duplicate bone name: {0}")]
    DuplicateBoneName(String),
}

/// 动画时间轴错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    #[error("{animation}: invalid frame index ({frame}), timeline only has {keyframes} keyframes")]
    InvalidFrame {
        animation: String,
        frame: usize,
        keyframes: usize,
    },

    #[error("{animation}: malformed timeline: {reason}")]
    MalformedTimeline { animation: String, reason: String },
}

/// 蒙皮错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkinError {
    #[error("Batch index out of range: {batch} (skin has {count} batches)")]
    BatchOutOfRange { batch: usize, count: usize },

    #[error("Vertex index out of range: batch {batch}, vertex {vertex} (batch has {count} vertices)")]
    VertexOutOfRange {
        batch: usize,
        vertex: usize,
        count: usize,
    },

    #[error("Skin node has no skin geometry")]
    NoSkin,

    #[error("Operation '{operation}' is not allowed on a SkinTransferNode")]
    RestrictedOperation { operation: &'static str },

    #[error("Skin node is bound to a different skeleton")]
    SkeletonMismatch,

    #[error("Skin node has no skeleton bound")]
    NoSkeleton,

    #[error("Skeleton root bone '{0}' not found")]
    RootNotFound(String),

    #[error(transparent)]
    Skeleton(#[from] SkeletonError),
}

/// 序列化错误
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unresolved reference after load: {0}")]
    UnresolvedReference(String),
}

/// 引擎结果类型别名
pub type EngineResult<T> = Result<T, EngineError>;
pub type SkeletonResult<T> = Result<T, SkeletonError>;
pub type AnimationResult<T> = Result<T, AnimationError>;
pub type SkinResult<T> = Result<T, SkinError>;
pub type SerializationResult<T> = Result<T, SerializationError>;
