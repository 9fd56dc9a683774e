use serde::Deserialize;
use std::{collections::HashMap, fmt, str::FromStr};

use super::env_value;
use crate::errors::ConfigError;

/// How outgoing mail is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMode {
    /// Messages are recorded and traced, never sent
    Log,
    /// Messages are relayed to an SMTP server
    Smtp,
}

impl FromStr for EmailMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(EmailMode::Log),
            "smtp" => Ok(EmailMode::Smtp),
            _ => Err(ConfigError::InvalidValue {
                field: "email.mode".to_string(),
                value: s.to_string(),
                expected: "log or smtp",
            }),
        }
    }
}

impl fmt::Display for EmailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailMode::Log => write!(f, "log"),
            EmailMode::Smtp => write!(f, "smtp"),
        }
    }
}

/// Email Configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub mode: EmailMode,
    pub host: String,
    pub port: u16,
    pub from: String,
}

/// Partial Email Configuration for loading from files
#[derive(Deserialize, Debug, Default)]
pub struct PartialEmailConfig {
    pub mode: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub from: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            mode: EmailMode::Log,
            host: String::new(),
            port: default_smtp_port(),
            from: default_sender(),
        }
    }
}

impl EmailConfig {
    /// Create EmailConfig from environment variables and file config
    pub fn from_env_or_file(
        file_config: Option<PartialEmailConfig>,
        env_map: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let file_config = file_config.unwrap_or_default();

        let mode = match env_map.get("WIREBOX_EMAIL_MODE").or(file_config.mode.as_ref()) {
            Some(raw) => raw.parse()?,
            None => EmailMode::Log,
        };

        let host = env_map
            .get("WIREBOX_EMAIL_HOST")
            .cloned()
            .or(file_config.host)
            .unwrap_or_default();

        let port = env_value(env_map, "WIREBOX_EMAIL_PORT", "a port number")?
            .or(file_config.port)
            .unwrap_or_else(default_smtp_port);

        let from = env_map
            .get("WIREBOX_EMAIL_FROM")
            .cloned()
            .or(file_config.from)
            .unwrap_or_else(default_sender);

        Ok(EmailConfig {
            mode,
            host,
            port,
            from,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == EmailMode::Smtp && self.host.trim().is_empty() {
            return Err(ConfigError::FieldMissing("email.host".to_string()));
        }
        if !self.from.contains('@') {
            return Err(ConfigError::InvalidValue {
                field: "email.from".to_string(),
                value: self.from.clone(),
                expected: "an email address",
            });
        }
        Ok(())
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_sender() -> String {
    "noreply@localhost".to_string()
}
