use thiserror::Error;

#[derive(Debug, Error)]
pub enum EqError {
    #[error("equation not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("external tool failed: {0}")]
    Tool(String),
}

pub type EqResult<T> = Result<T, EqError>;
