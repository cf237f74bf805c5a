//! 骨骼变化通知
//!
//! 骨骼只持有监听者的弱引用，监听者的生命周期由其所有者决定。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

/// 骨骼变化事件
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoneChangeEvent {
    /// 触发事件的骨骼（皮肤根骨骼）索引
    pub bone: usize,
    /// 骨骼名称
    pub bone_name: String,
}

/// 骨骼变化监听者
pub trait BoneChangeListener: Send + Sync {
    fn bone_changed(&self, event: &BoneChangeEvent);
}

/// 监听者注册句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) listener: Weak<dyn BoneChangeListener>,
}
