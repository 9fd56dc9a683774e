use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::ConfigError;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const FORMATS: [&str; 2] = ["pretty", "compact"];

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct PartialLogConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LogConfig {
    pub fn from_env_or_file(file_config: Option<PartialLogConfig>, env_map: &HashMap<String, String>) -> Self {
        let file_config = file_config.unwrap_or_default();
        let defaults = LogConfig::default();

        let level = env_map
            .get("WIREBOX_LOG_LEVEL")
            .cloned()
            .or(file_config.level)
            .unwrap_or(defaults.level)
            .to_ascii_lowercase();

        let format = env_map
            .get("WIREBOX_LOG_FORMAT")
            .cloned()
            .or(file_config.format)
            .unwrap_or(defaults.format)
            .to_ascii_lowercase();

        LogConfig { level, format }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.level.clone(),
                expected: "one of trace, debug, info, warn, error",
            });
        }
        if !FORMATS.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                value: self.format.clone(),
                expected: "pretty or compact",
            });
        }
        Ok(())
    }
}
