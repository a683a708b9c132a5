use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Rate limit exceeded: retry after {retry_after_ms}ms")]
    RateLimitError { retry_after_ms: u64 },
    #[error("Upstream error: {0}")]
    UpstreamError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl GatewayError {
    /// Human-readable message without the category prefix, as returned to callers.
    pub fn message(&self) -> String {
        match self {
            GatewayError::ValidationError(msg)
            | GatewayError::UpstreamError(msg)
            | GatewayError::StorageError(msg)
            | GatewayError::ConfigError(msg)
            | GatewayError::NotFound(msg) => msg.clone(),
            GatewayError::RateLimitError { retry_after_ms } => format!(
                "Too many requests. Please wait {} seconds.",
                retry_after_ms.div_ceil(1000)
            ),
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::StorageError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
