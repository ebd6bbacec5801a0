use config_db::DbError;

/// Engine error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown config module: {0}")]
    UnknownModule(String),

    #[error("config type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("config module already registered: {0}")]
    DuplicateModule(String),

    #[error("invalid config spec: {0}")]
    InvalidSpec(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Flatten the storage layer's cancellation into [`ConfigError::Cancelled`].
    pub(crate) fn from_db(err: DbError) -> Self {
        match err {
            DbError::Cancelled => Self::Cancelled,
            other => Self::Database(other),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
