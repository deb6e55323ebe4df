use crate::errors::ToolError;
use crate::managers::api::ApiManager;
use crate::mcp::catalog::tool_catalog;
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(
            ToolError::internal(format!("Tool wiring is incomplete: {}", missing.join(", ")))
                .with_hint(
                    "Every tool in tool_catalog.json must have a handler registered at startup.",
                ),
        )
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("restgate");

        let api_manager: Arc<dyn ToolHandler> = Arc::new(ApiManager::new(logger.clone()));
        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("rest_api_request".to_string(), api_manager.clone());
        handlers.insert("rest_api_graphql".to_string(), api_manager);

        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));
        Ok(Self {
            logger,
            tool_executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_tool_has_a_handler() {
        let app = App::initialize().expect("app must initialize");
        let known = app.tool_executor.known_tools();
        for tool in tool_catalog().iter() {
            assert!(known.contains(&tool.name), "unwired tool: {}", tool.name);
        }
    }
}
