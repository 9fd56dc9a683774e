pub mod app_config;
pub mod email_config;
pub mod loader;
pub mod log_config;
pub mod storage_config;

use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::ConfigError;

// Re-export commonly used types
pub use app_config::{AppConfig, PartialAppConfig, CONFIG_FILE_NAME, USER_CONFIG_PATH};
pub use email_config::{EmailConfig, EmailMode};
pub use loader::ConfigLoader;
pub use log_config::LogConfig;
pub use storage_config::{StorageBackend, StorageConfig};

/// Parse an environment override, reporting malformed values instead of ignoring them
pub(crate) fn env_value<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                expected,
            }),
        None => Ok(None),
    }
}
