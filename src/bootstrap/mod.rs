//! 组合根
//!
//! 启动时把配置和各个服务注册进容器，之后只通过容器解析。

pub mod email;
pub mod storage;
pub mod users;

use std::sync::Arc;

use tracing::info;

pub use email::{build_email_service, EmailMessage, EmailService, LogEmailService, SmtpEmailService};
pub use storage::{build_storage, LocalStorage, MemoryStorage, Storage};
pub use users::{Database, InMemoryUserRepository, User, UserRepository, UserService};

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::infrastructure::container::{ServiceContainer, ServiceLifetime};
use crate::logging::OperationTimer;

/// 构建应用容器
pub fn init_container(config: &AppConfig) -> Result<ServiceContainer, AppError> {
    let timer = OperationTimer::new("init_container")
        .with_metadata("email_mode", &config.email.mode.to_string())
        .with_metadata("storage_backend", &config.storage.backend.to_string());

    let container = ServiceContainer::new();

    let shared_config = Arc::new(config.clone());
    container.register_factory::<AppConfig, _>(move || Arc::clone(&shared_config), ServiceLifetime::Singleton)?;

    container.register_factory::<Database, _>(|| Arc::new(Database::new()), ServiceLifetime::Singleton)?;

    info!(mode = %config.email.mode, "creating email service");
    container.provide::<dyn EmailService>(build_email_service(&config.email)?)?;

    info!(backend = %config.storage.backend, "creating storage");
    container.provide::<dyn Storage>(build_storage(&config.storage))?;

    container.register::<dyn UserRepository, _, _>(
        |db: Arc<Database>| -> Arc<dyn UserRepository> { Arc::new(InMemoryUserRepository::new(db)) },
        ServiceLifetime::Singleton,
    )?;

    container.register::<UserService, _, _>(
        |repository: Arc<dyn UserRepository>, email: Arc<dyn EmailService>| Arc::new(UserService::new(repository, email)),
        ServiceLifetime::Singleton,
    )?;

    timer.finish();
    Ok(container)
}

/// 解析用户服务，失败即 panic
pub fn user_service(container: &ServiceContainer) -> Arc<UserService> {
    container.must_resolve::<UserService>()
}

/// 解析用户仓储，失败即 panic
pub fn user_repository(container: &ServiceContainer) -> Arc<dyn UserRepository> {
    container.must_resolve::<dyn UserRepository>()
}
