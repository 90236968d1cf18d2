//! 远端动作适配为本地 Tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::capability::{CapabilityError, CapabilityServer};
use crate::llm::ActionSpec;
use crate::tools::{Tool, ToolContext, ToolRegistry};

/// 能力服务器上的一个动作
pub struct RemoteTool {
    server: Arc<dyn CapabilityServer>,
    spec: ActionSpec,
}

impl RemoteTool {
    pub fn new(server: Arc<dyn CapabilityServer>, spec: ActionSpec) -> Self {
        Self { server, spec }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameters_schema(&self) -> Value {
        self.spec.parameters.clone()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext<'_>) -> Result<String, String> {
        self.server
            .invoke(&self.spec.name, args)
            .await
            .map_err(|e| e.to_string())
    }
}

/// 拉取服务器当前的动作列表，构建 Worker 的注册表
pub async fn remote_registry(
    server: Arc<dyn CapabilityServer>,
) -> Result<ToolRegistry, CapabilityError> {
    let specs = server.list_actions().await?;
    let mut registry = ToolRegistry::new();
    for spec in specs {
        registry.register(RemoteTool::new(server.clone(), spec));
    }
    tracing::info!(
        capability = %server.name(),
        actions = ?registry.tool_names(),
        "registered remote actions"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StaticServer;

    #[async_trait]
    impl CapabilityServer for StaticServer {
        fn name(&self) -> &str {
            "static"
        }

        async fn list_actions(&self) -> Result<Vec<ActionSpec>, CapabilityError> {
            Ok(vec![ActionSpec {
                name: "read_note".into(),
                description: "Read a note".into(),
                parameters: json!({"type": "object", "properties": {"title": {"type": "string"}}}),
            }])
        }

        async fn invoke(&self, action: &str, args: Value) -> Result<String, CapabilityError> {
            Ok(format!("{} {}", action, args["title"].as_str().unwrap_or("")))
        }
    }

    #[tokio::test]
    async fn test_remote_registry_exposes_server_actions() {
        let registry = remote_registry(Arc::new(StaticServer)).await.unwrap();
        assert_eq!(registry.tool_names(), vec!["read_note".to_string()]);
        let tool = registry.get("read_note").unwrap();
        assert_eq!(tool.parameters_schema()["properties"]["title"]["type"], "string");
        let out = tool
            .execute(json!({"title": "Foo"}), &ToolContext::new("t", &[]))
            .await
            .unwrap();
        assert_eq!(out, "read_note Foo");
    }
}
