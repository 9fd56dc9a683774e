//! 依赖注入容器
//!
//! 按 (类型, 标签) 注册构造方式，按需解析对象图：
//! - 单例 / 瞬态生命周期
//! - 构造函数参数递归解析
//! - 循环依赖检测
//! - 并发下单例最多构造一次

pub mod key;
pub mod provider;
mod registry;
pub mod resolver;
pub mod service_container;
pub mod stats;

use std::fmt;

pub use key::TypeKey;
pub use provider::{Constructed, Constructor, Dependency, Inject};
pub use resolver::Resolver;
pub use service_container::ServiceContainer;
pub use stats::ContainerStats;

pub use crate::errors::ContainerError;

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// 整个容器生命周期内只有一个实例
    Singleton,
    /// 每次解析都创建新实例
    Transient,
}

impl fmt::Display for ServiceLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceLifetime::Singleton => write!(f, "singleton"),
            ServiceLifetime::Transient => write!(f, "transient"),
        }
    }
}
