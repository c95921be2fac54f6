//! Tool handler trait.

use protocol::{Tool, ToolError};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`ToolHandler::execute`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;

/// Uniform invocation contract backing one tool.
///
/// The routing layer is written against this trait only, never against a
/// concrete handler, so back ends of any shape can sit behind it. The
/// split matters: `validate` is cheap and synchronous (apply defaults,
/// reject bad shapes) and must not perform I/O, so bad arguments are
/// rejected before anything leaves the process; `execute` gets the
/// normalized arguments and does the actual outbound call.
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Model-readable description.
    fn description(&self) -> &str;

    /// JSON schema of the expected arguments.
    fn input_schema(&self) -> Value;

    /// Check and normalize arguments. Must not perform I/O.
    fn validate(&self, arguments: Value) -> Result<Value, ToolError>;

    /// Execute with arguments previously normalized by [`Self::validate`].
    fn execute(&self, arguments: Value) -> HandlerFuture<'_>;

    /// The descriptor advertised through discovery.
    fn descriptor(&self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::json;

    /// Echoes its normalized arguments back as the payload.
    #[derive(Debug)]
    pub struct EchoTool {
        pub name: &'static str,
    }

    impl ToolHandler for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Echo arguments back"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn validate(&self, arguments: Value) -> Result<Value, ToolError> {
            if arguments.get("fail_validation").is_some() {
                return Err(ToolError::InvalidInput("fail_validation was set".into()));
            }
            Ok(arguments)
        }

        fn execute(&self, arguments: Value) -> HandlerFuture<'_> {
            Box::pin(async move { Ok(json!({"echo": arguments})) })
        }
    }

    /// Panics during execution, standing in for a defective handler.
    #[derive(Debug)]
    pub struct PanicTool;

    impl ToolHandler for PanicTool {
        fn name(&self) -> &str {
            "panic"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn validate(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(arguments)
        }

        fn execute(&self, _arguments: Value) -> HandlerFuture<'_> {
            Box::pin(async move { panic!("defective handler") })
        }
    }

    /// Never completes within any reasonable test budget.
    #[derive(Debug)]
    pub struct SleepyTool;

    impl ToolHandler for SleepyTool {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleeps for a long time"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn validate(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(arguments)
        }

        fn execute(&self, _arguments: Value) -> HandlerFuture<'_> {
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(Value::Null)
            })
        }
    }
}
