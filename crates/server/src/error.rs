//! Server error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be brought up (bad HTTP client config, etc.)
    /// or a handler is missing its required credential.
    #[error("startup: {0}")]
    Startup(String),

    #[error("failed to read config: {0}")]
    ConfigIo(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("channel i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
