use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf};

use super::{
    email_config::{EmailConfig, PartialEmailConfig},
    loader::ConfigLoader,
    log_config::{LogConfig, PartialLogConfig},
    storage_config::{PartialStorageConfig, StorageConfig},
};
use crate::errors::ConfigError;

// Configuration location constants
pub const USER_CONFIG_PATH: &str = "~/.config/wirebox";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main Application Configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub email: EmailConfig,
    pub storage: StorageConfig,
    pub logging: LogConfig,
}

/// Partial Application Configuration for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialAppConfig {
    email: Option<PartialEmailConfig>,
    storage: Option<PartialStorageConfig>,
    logging: Option<PartialLogConfig>,
}

impl AppConfig {
    /// Load configuration from the default location and environment
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load_config()
    }

    /// Load configuration with custom base path (for testing)
    pub fn load_with_base_path(base_path: PathBuf) -> Result<Self, ConfigError> {
        ConfigLoader::with_base_path(base_path).load_config()
    }

    /// Create AppConfig from partial config and environment
    pub fn from_partial_and_env(
        partial: Option<PartialAppConfig>,
        env_map: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let partial = partial.unwrap_or_default();

        let email = EmailConfig::from_env_or_file(partial.email, &env_map)?;
        let storage = StorageConfig::from_env_or_file(partial.storage, &env_map)?;
        let logging = LogConfig::from_env_or_file(partial.logging, &env_map);

        let config = AppConfig {
            email,
            storage,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.email.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
