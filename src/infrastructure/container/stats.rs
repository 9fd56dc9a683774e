//! 容器统计信息

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 内部原子计数器
#[derive(Default)]
pub(crate) struct InnerStats {
    total_resolutions: AtomicU64,
    singleton_cache_hits: AtomicU64,
    singleton_cache_misses: AtomicU64,
    transient_creations: AtomicU64,
}

impl InnerStats {
    pub(crate) fn record_resolution(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.singleton_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.singleton_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient(&self) {
        self.transient_creations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, registered_services: usize, active_singletons: usize) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            singleton_cache_hits: self.singleton_cache_hits.load(Ordering::Relaxed),
            singleton_cache_misses: self.singleton_cache_misses.load(Ordering::Relaxed),
            transient_creations: self.transient_creations.load(Ordering::Relaxed),
            registered_services,
            active_singletons,
        }
    }

    pub(crate) fn reset(&self) {
        self.total_resolutions.store(0, Ordering::Relaxed);
        self.singleton_cache_hits.store(0, Ordering::Relaxed);
        self.singleton_cache_misses.store(0, Ordering::Relaxed);
        self.transient_creations.store(0, Ordering::Relaxed);
    }
}

/// 容器统计信息快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerStats {
    /// 总解析次数（包括构造参数的递归解析）
    pub total_resolutions: u64,
    /// 单例缓存命中次数
    pub singleton_cache_hits: u64,
    /// 单例缓存未命中次数，即单例实际构造次数
    pub singleton_cache_misses: u64,
    /// 瞬态服务创建次数
    pub transient_creations: u64,
    /// 注册键数量
    pub registered_services: usize,
    /// 已缓存的单例数量
    pub active_singletons: usize,
}

impl ContainerStats {
    /// 缓存命中率（百分比）
    pub fn cache_hit_rate(&self) -> f64 {
        self.hit_rate() * 100.0
    }

    /// 缓存命中率（小数）
    pub fn hit_rate(&self) -> f64 {
        let total = self.singleton_cache_hits + self.singleton_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.singleton_cache_hits as f64 / total as f64
        }
    }

    /// 性能摘要
    pub fn performance_summary(&self) -> String {
        format!(
            "Container Performance: {} total resolutions, {:.1}% cache hit rate, {} registered services, {} active singletons",
            self.total_resolutions,
            self.cache_hit_rate(),
            self.registered_services,
            self.active_singletons
        )
    }
}
