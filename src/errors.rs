use thiserror::Error;

/// Boxed error returned by fallible constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("I/O error while {0}: {1}")]
    IO(String, #[source] std::io::Error), // For generic I/O errors not covered by specific types
    #[error("Logging setup failed: {0}")]
    Logging(String),
    #[error("Email error: {0}")]
    Email(String),
    #[error("Application error: {0}")]
    Generic(String),
}

/// 依赖注入容器错误
///
/// 所有错误都同步返回给调用方，容器本身不会重试或吞掉错误。
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 容器已关闭
    #[error("container is closed")]
    Closed,

    /// 没有找到对应的注册
    #[error("no registration found for type {key}")]
    NotFound { key: String },

    /// 同一个键下存在多个注册，但调用方只请求了单个实例
    #[error("multiple registrations ({count}) for {key}: specify a tag or resolve a collection of {type_name}")]
    Ambiguous {
        key: String,
        type_name: String,
        count: usize,
    },

    /// 循环依赖
    #[error("circular dependency detected for type {key} (chain: {})", .chain.join(" -> "))]
    Circular { key: String, chain: Vec<String> },

    /// 注册时的校验失败
    #[error("invalid registration for {key}: {reason}")]
    Validation { key: String, reason: String },

    /// 构造函数自身返回了错误
    #[error("failed to construct {key}: {source}")]
    ConstructionFailed {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl ContainerError {
    pub(crate) fn validation(key: impl ToString, reason: impl Into<String>) -> Self {
        ContainerError::Validation {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised by a misconfigured registration rather than a failing recipe.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ContainerError::NotFound { .. }
                | ContainerError::Ambiguous { .. }
                | ContainerError::Validation { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Required configuration field '{0}' is missing or invalid")]
    FieldMissing(String),
    #[error("Invalid value '{value}' for '{field}': expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },
}

// --- From implementations for AppError ---

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IO("I/O operation failed".to_string(), err)
    }
}
