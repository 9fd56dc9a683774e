pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use bootstrap::init_container;
pub use config::AppConfig;
pub use errors::{AppError, ContainerError};
pub use infrastructure::container::{Resolver, ServiceContainer, ServiceLifetime};
