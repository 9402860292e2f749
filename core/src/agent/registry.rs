use crate::traits::{Tool, ToolResult, ToolSpec};
use std::sync::{Arc, PoisonError, RwLock};

pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Registering a second tool with an existing name replaces the first.
    pub fn register(&self, tool: Box<dyn Tool>) {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools.retain(|t| t.name() != tool.name());
        tools.push(Arc::from(tool));
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
        tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Never fails: unknown tools and tool errors come back as error results
    /// for the model to read.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        let tool = {
            let tools = self.tools.read().unwrap_or_else(PoisonError::into_inner);
            tools.iter().find(|t| t.name() == name).cloned()
        };

        match tool {
            Some(tool) => match tool.execute(args).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(tool = name, error = %e, "tool execution failed");
                    ToolResult::error(format!("Execution failed: {}", e))
                }
            },
            None => ToolResult::error(format!("Tool '{}' not found", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            self.0
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
            match args.get("fail") {
                Some(_) => anyhow::bail!("asked to fail"),
                None => Ok(ToolResult::success(self.0)),
            }
        }
    }

    #[tokio::test]
    async fn unknown_and_failing_tools_become_error_results() {
        let registry = ToolRegistry::new();
        registry.register(Box::new(Echo("first")));

        let missing = registry.execute("nope", json!({})).await;
        assert_eq!(missing.error.as_deref(), Some("Tool 'nope' not found"));

        let failed = registry.execute("echo", json!({"fail": true})).await;
        assert!(!failed.success);
        assert!(failed.error.unwrap().contains("asked to fail"));
    }

    #[tokio::test]
    async fn re_registering_replaces() {
        let registry = ToolRegistry::new();
        registry.register(Box::new(Echo("first")));
        registry.register(Box::new(Echo("second")));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.execute("echo", json!({})).await.output, "second");
    }
}
