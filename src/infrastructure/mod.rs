//! 基础设施层
//!
//! 目前只有依赖注入容器。

pub mod container;

// 重新导出API
pub use container::{ContainerError, ContainerStats, ServiceContainer, ServiceLifetime, TypeKey};
