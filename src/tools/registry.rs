//! 工具注册表
//!
//! 所有动作实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时、退避重试并统一转为 ActionResult。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ActionSpec;
use crate::memory::Message;

/// 工具执行上下文：所在线程与当前历史（委派动作据此找到用户原始请求）
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    pub thread_id: &'a str,
    pub history: &'a [Message],
}

impl<'a> ToolContext<'a> {
    pub fn new(thread_id: &'a str, history: &'a [Message]) -> Self {
        Self { thread_id, history }
    }
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（推理后端以此名请求调用）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema
    /// 默认返回空对象，表示无参数或参数格式不限
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行前的参数检查；失败属于确定性错误，执行器不会重试
    fn validate(&self, _args: &Value) -> Result<(), String> {
        Ok(())
    }

    /// 执行工具
    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool registered twice, keeping the latest");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// 按名称排序
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 动作 schema 列表（按名称排序，保证请求稳定）
    pub fn action_specs(&self) -> Vec<ActionSpec> {
        let mut specs: Vec<ActionSpec> = self
            .tools
            .iter()
            .map(|(name, tool)| ActionSpec {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;

    #[test]
    fn test_registry_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.tool_names(), vec!["echo".to_string()]);
    }

    #[test]
    fn test_action_specs_include_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let specs = registry.action_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].parameters["type"], "object");
    }
}
