//! Error types for Elicit

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("session completed: {0}")]
    SessionCompleted(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("scorer failure: {scorer} - {message}")]
    ScorerFailure { scorer: String, message: String },

    #[error("llm failure: {client} - {message}")]
    LlmFailure { client: String, message: String },

    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn scorer_failure(scorer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScorerFailure {
            scorer: scorer.into(),
            message: message.into(),
        }
    }

    pub fn llm_failure(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmFailure {
            client: client.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::InvalidInput(_) => "invalid_input",
            Error::SessionCompleted(_) => "session_completed",
            Error::SchemaViolation(_) => "schema_violation",
            Error::ScorerFailure { .. } => "scorer_failure",
            Error::LlmFailure { .. } => "llm_failure",
            Error::StoreFailure(_) => "store_failure",
            Error::Cancelled => "cancelled",
            Error::ConfigError(_) => "config_error",
            Error::IoError(_) => "io_error",
            Error::YamlError(_) => "yaml_error",
            Error::JsonError(_) => "json_error",
        }
    }
}
