use crate::traits::{Tool, ToolCall, ToolResult, ToolSpec};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub struct ToolRegistry {
    tools: Mutex<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Mutex::new(Vec::new()),
        }
    }

    /// Registers `tool`, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = tools.iter().position(|t| t.name() == tool.name()) {
            warn!(tool = tool.name(), "Replacing previously registered tool");
            tools[pos] = tool;
        } else {
            tools.push(tool);
        }
    }

    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
        tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        let tools = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
        tools.iter().map(|t| t.spec()).collect()
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        let tool = {
            let tools = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
            tools.iter().find(|t| t.name() == name).cloned()
        };

        match tool {
            Some(tool) => match tool.execute(args).await {
                Ok(result) => result,
                Err(e) => ToolResult::error(format!("Execution failed: {}", e)),
            },
            None => ToolResult::error(format!("Tool '{}' not found", name)),
        }
    }

    /// Runs a model-issued call. Unparseable arguments become an error result.
    pub async fn execute_call(&self, call: &ToolCall) -> ToolResult {
        let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool arguments are not valid JSON");
                return ToolResult::error(format!(
                    "Failed to parse tool arguments for {}: {}",
                    call.name, e
                ));
            }
        };

        let result = self.execute(&call.name, args).await;
        info!(tool = %call.name, id = %call.id, success = result.success, "Tool executed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SquareRootTool;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SquareRootTool));

        let result = registry
            .execute_call(&call("square_root", "{\"number\": 16}"))
            .await;
        assert!(result.success);
        assert_eq!(result.output, "4");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute_call(&call("missing", "{}")).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool 'missing' not found"));
    }

    #[tokio::test]
    async fn bad_arguments_are_an_error_result() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SquareRootTool));
        let result = registry.execute_call(&call("square_root", "{oops")).await;
        assert!(!result.success);
        assert!(result.message_text().starts_with("Error: Failed to parse"));
    }

    #[test]
    fn same_name_replaces() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(SquareRootTool));
        registry.register(Arc::new(SquareRootTool));
        assert_eq!(registry.names(), vec!["square_root"]);
        assert_eq!(registry.get_specs().len(), 1);
    }
}
