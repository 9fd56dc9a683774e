use serde::Deserialize;
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};

use crate::errors::ConfigError;

/// Where uploaded objects live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files under `base_dir`
    Local,
    /// Process memory, lost on exit
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidValue {
                field: "storage.backend".to_string(),
                value: s.to_string(),
                expected: "local or memory",
            }),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Storage Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub base_dir: PathBuf,
    pub public_base_url: String,
}

/// Partial Storage Configuration for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialStorageConfig {
    pub backend: Option<String>,
    pub base_dir: Option<String>,
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            base_dir: PathBuf::from(default_base_dir()),
            public_base_url: default_public_base_url(),
        }
    }
}

impl StorageConfig {
    /// Create StorageConfig from environment variables and file config
    pub fn from_env_or_file(
        file_config: Option<PartialStorageConfig>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let file_config = file_config.unwrap_or_default();

        let backend = match env_map
            .get("WIREBOX_STORAGE_BACKEND")
            .or(file_config.backend.as_ref())
        {
            Some(raw) => raw.parse()?,
            None => StorageBackend::Local,
        };

        let base_dir = env_map
            .get("WIREBOX_STORAGE_BASE_DIR")
            .cloned()
            .or(file_config.base_dir)
            .unwrap_or_else(default_base_dir);
        // `~` is expanded here so the rest of the program only sees real paths
        let base_dir = PathBuf::from(shellexpand::tilde(&base_dir).as_ref());

        let public_base_url = env_map
            .get("WIREBOX_STORAGE_PUBLIC_BASE_URL")
            .cloned()
            .or(file_config.public_base_url)
            .unwrap_or_else(default_public_base_url);

        Ok(StorageConfig {
            backend,
            base_dir,
            public_base_url,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StorageBackend::Local && self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::FieldMissing("storage.base_dir".to_string()));
        }
        if !(self.public_base_url.starts_with('/')
            || self.public_base_url.starts_with("http://")
            || self.public_base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidValue {
                field: "storage.public_base_url".to_string(),
                value: self.public_base_url.clone(),
                expected: "an absolute path or http(s) URL",
            });
        }
        Ok(())
    }
}

fn default_base_dir() -> String {
    "./uploads".to_string()
}

fn default_public_base_url() -> String {
    "/uploads".to_string()
}
