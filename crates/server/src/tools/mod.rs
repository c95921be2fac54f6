//! The concrete tool handlers and the registry built from configuration.

mod finance;
mod web;
mod wiki;

pub use finance::StockQuote;
pub use web::WebSearch;
pub use wiki::WikiSearch;

use std::sync::Arc;
use std::time::Duration;

use protocol::ToolError;
use tracing::warn;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::ToolRegistry;

pub(crate) const USER_AGENT: &str = concat!("spyglass/", env!("CARGO_PKG_VERSION"));

/// Budget for a single outbound provider request.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the registry from configuration. Registration order is fixed here;
/// it is what discovery lists.
///
/// A handler whose credential is missing is skipped with a warning;
/// degradation is per-tool, never whole-server.
pub fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::Startup(e.to_string()))?;

    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(WikiSearch::new(http.clone())))?;

    match WebSearch::from_config(http.clone(), &config.credentials) {
        Ok(tool) => registry.register(Arc::new(tool))?,
        Err(e) => warn!("web_search disabled: {e}"),
    }

    registry.register(Arc::new(StockQuote::new(http)))?;

    Ok(registry)
}

/// Map a reqwest failure (connect refused, DNS, timeout, body decode) to
/// the transport failure kind.
pub(crate) fn transport_error(err: &reqwest::Error) -> ToolError {
    ToolError::Transport(err.to_string())
}
