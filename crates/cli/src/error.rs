//! CLI error types.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No server command was given after `--`.
    #[error("no server command given")]
    MissingServerCommand,

    /// The arguments string was not a JSON object.
    #[error("invalid arguments: {0}")]
    BadArguments(String),

    /// An error occurred in the client layer.
    #[error(transparent)]
    Client(#[from] client::Error),

    /// An error occurred in the server layer.
    #[error(transparent)]
    Server(#[from] server::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
