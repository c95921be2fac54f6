//! Configuration loading from spyglass.toml.

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Third-party provider credentials, read once at startup.
    #[serde(default)]
    pub credentials: Credentials,
}

/// Server tuning.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Name advertised during the initialize handshake.
    #[serde(default = "default_name")]
    pub name: String,

    /// Per-invocation budget in seconds. A handler still pending when this
    /// expires is abandoned and the call answered with a transport failure.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Credentials for tools that need them. A missing credential disables the
/// affected tool only; the rest of the server stays up.
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    /// Tavily API key for web_search.
    pub tavily_api_key: Option<String>,
}

fn default_name() -> String {
    "spyglass".to_string()
}

fn default_call_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(Error::ConfigIo)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
