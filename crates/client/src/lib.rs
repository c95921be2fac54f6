//! Client for Spyglass tool servers.
//!
//! Spawns a tool server process, speaks line-delimited JSON-RPC over its
//! stdio, and exposes the three operations an orchestrator needs:
//! `discover`, `invoke`, `close`.
//!
//! # Example
//!
//! ```no_run
//! use client::{Session, SessionConfig};
//! use std::collections::HashMap;
//!
//! # async fn example() -> client::Result<()> {
//! let config = SessionConfig {
//!     name: "spyglass".to_string(),
//!     command: "spyglass".to_string(),
//!     args: vec!["serve".to_string()],
//!     env: HashMap::new(),
//! };
//!
//! let session = Session::connect(config).await?;
//!
//! let tools = session.discover().await?;
//! for tool in &tools {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let outcome = session.invoke("wiki_search", Some(serde_json::json!({
//!     "query": "Rust (programming language)"
//! }))).await?;
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Tool-level failures (bad input, upstream auth problems, rate limits)
//! come back inside `Outcome::Failure`; a session [`Error`] always means
//! the channel itself is in trouble.

mod error;
mod session;

pub use error::{Error, Result};
pub use session::{DEFAULT_TIMEOUT, MAX_FRAME_SIZE, Session, SessionConfig};
