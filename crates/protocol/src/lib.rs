//! Wire protocol shared by the Spyglass tool server and client.
//!
//! Both ends speak JSON-RPC 2.0, one JSON object per line. This crate holds
//! the frame types ([`JsonRpcRequest`], [`JsonRpcResponse`]), the tool
//! descriptor and invocation types ([`Tool`], [`Outcome`], [`ToolError`]),
//! and the payloads for each protocol method.
//!
//! # Message flow
//!
//! ```text
//! client                          server
//!   | -- initialize ------------->  |
//!   | <-- InitializeResult -------  |
//!   | -- notifications/initialized> |
//!   | -- tools/list ------------->  |
//!   | <-- ListToolsResult --------  |
//!   | -- tools/call ------------->  |
//!   | <-- Outcome ----------------  |
//! ```
//!
//! Tool-level failures (bad input, upstream auth, rate limits, ...) travel
//! inside [`Outcome::Failure`] within a *successful* JSON-RPC response.
//! [`JsonRpcError`] is reserved for protocol-level faults: unparseable
//! frames, unknown methods, malformed params.

mod rpc;
mod tool;

pub use rpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, error_codes,
};
pub use tool::{
    CallToolParams, ClientInfo, InitializeParams, InitializeResult, ListToolsResult, Outcome,
    PROTOCOL_VERSION, ServerCapabilities, ServerInfo, Tool, ToolError, ToolsCapability, methods,
};
