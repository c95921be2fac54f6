//! Spyglass tool server — registry, handlers, and the serve loop.
//!
//! The server exposes a fixed set of information-retrieval tools over
//! line-delimited JSON-RPC on stdio. The registry is built once at startup
//! from configuration and immutable afterwards; each request is answered in
//! receipt order.
//!
//! # Example
//!
//! ```no_run
//! use server::{Config, ToolServer, build_registry};
//!
//! # async fn example() -> server::Result<()> {
//! let config = Config::load("spyglass.toml")?;
//! let registry = build_registry(&config)?;
//!
//! ToolServer::new(registry)
//!     .with_name(config.server.name.clone())
//!     .serve_stdio()
//!     .await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod registry;
mod serve;
pub mod tools;

pub use config::{Config, Credentials, ServerConfig};
pub use error::{Error, Result};
pub use handler::{HandlerFuture, ToolHandler};
pub use registry::ToolRegistry;
pub use serve::{DEFAULT_CALL_TIMEOUT, ToolServer};
pub use tools::build_registry;
