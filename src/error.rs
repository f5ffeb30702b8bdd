use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerfError {
    #[error("Connection factory failed for pool '{pool_type}': {message}")]
    ConnectionFactory { pool_type: String, message: String },

    #[error("Connection pool has been destroyed")]
    PoolDestroyed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Metric source '{source_name}' failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl PerfError {
    pub fn factory(pool_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFactory {
            pool_type: pool_type.into(),
            message: message.into(),
        }
    }

    pub fn source_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PerfError>;
