use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ToolError;
use crate::services::logger::Logger;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, tool: &str, args: Value) -> Result<Value, ToolError>;
}

/// Dispatches tool calls over an immutable name -> handler table built once
/// at startup. Unknown names are a tool-level failure the caller can recover
/// from, not a protocol fault.
#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn known_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool) else {
            return Err(ToolError::not_found(format!("Unknown tool: {}", tool))
                .with_hint(format!("Known tools: {}", self.known_tools().join(", "))));
        };
        self.logger
            .debug("Dispatching tool call", Some(&serde_json::json!({"tool": tool})));
        handler.handle(tool, args).await
    }
}
