use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

use super::app_config::{AppConfig, PartialAppConfig, CONFIG_FILE_NAME, USER_CONFIG_PATH};
use crate::errors::ConfigError;

const ENV_KEYS: [&str; 9] = [
    // Email config
    "WIREBOX_EMAIL_MODE",
    "WIREBOX_EMAIL_HOST",
    "WIREBOX_EMAIL_PORT",
    "WIREBOX_EMAIL_FROM",
    // Storage config
    "WIREBOX_STORAGE_BACKEND",
    "WIREBOX_STORAGE_BASE_DIR",
    "WIREBOX_STORAGE_PUBLIC_BASE_URL",
    // Logging config
    "WIREBOX_LOG_LEVEL",
    "WIREBOX_LOG_FORMAT",
];

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
    explicit_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default paths
    pub fn new() -> Self {
        Self {
            base_path: None,
            explicit_file: None,
        }
    }

    /// Create a config loader with custom base path (for testing)
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
            explicit_file: None,
        }
    }

    /// Load from a specific file; unlike the default location it must exist
    pub fn with_file(path: PathBuf) -> Self {
        Self {
            base_path: None,
            explicit_file: Some(path),
        }
    }

    /// Load complete application configuration
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let config_path = self.config_path();
        let partial_config = self.load_partial_config(&config_path)?;
        let env_map = self.collect_env_vars();

        AppConfig::from_partial_and_env(partial_config, env_map)
    }

    /// Path of the configuration file this loader reads
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.explicit_file {
            return PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
        }
        self.extract_file_path(USER_CONFIG_PATH, CONFIG_FILE_NAME)
    }

    /// Extract file path with tilde expansion and base path override
    fn extract_file_path(&self, base_dir: &str, file_name: &str) -> PathBuf {
        let expanded_base = if let Some(base_path) = &self.base_path {
            // For testing: use custom base path
            base_path.join(base_dir.trim_start_matches("~/"))
        } else {
            // Normal operation: expand tilde
            let expanded = shellexpand::tilde(base_dir);
            PathBuf::from(expanded.as_ref())
        };

        expanded_base.join(file_name)
    }

    /// Load partial configuration from TOML file
    fn load_partial_config(&self, config_path: &Path) -> Result<Option<PartialAppConfig>, ConfigError> {
        if !config_path.exists() {
            if self.explicit_file.is_some() {
                return Err(ConfigError::FileRead(
                    config_path.to_string_lossy().to_string(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "configuration file not found"),
                ));
            }
            tracing::info!("未发现配置文件 {:?}，将使用默认配置", config_path);
            return Ok(None);
        }

        let content = fs::read_to_string(config_path)
            .map_err(|e| ConfigError::FileRead(config_path.to_string_lossy().to_string(), e))?;

        let partial_config: PartialAppConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::TomlParse(config_path.to_string_lossy().to_string(), e))?;

        tracing::debug!("已加载配置文件: {:?}", config_path);
        Ok(Some(partial_config))
    }

    /// Collect relevant environment variables
    fn collect_env_vars(&self) -> HashMap<String, String> {
        let mut env_map = HashMap::new();
        for key in &ENV_KEYS {
            if let Ok(value) = env::var(key) {
                env_map.insert(key.to_string(), value);
            }
        }
        env_map
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
