//! 委派动作：Supervisor 唯一可用的动作集
//!
//! search_confluence / manage_obsidian_notes 各自转发给对应 Worker。转发前从当前线程历史中找到第一条用户消息，
//! 拼在子任务前面，使 Worker 在只拿到子任务描述时也有完整上下文。失败重试由 ToolExecutor 的退避策略负责。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::Worker;
use crate::memory::{first_human_message, Message};
use crate::tools::{Tool, ToolContext};

pub const SEARCH_CONFLUENCE: &str = "search_confluence";
pub const MANAGE_OBSIDIAN_NOTES: &str = "manage_obsidian_notes";

/// 委派动作参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DelegationArgs {
    /// Self-contained task for the specialist
    pub request: String,
}

/// 委派动作：名称 + 说明 + 目标 Worker
pub struct DelegationTool {
    name: String,
    description: String,
    worker: Arc<dyn Worker>,
}

impl DelegationTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        worker: Arc<dyn Worker>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            worker,
        }
    }

    pub fn search_confluence(worker: Arc<dyn Worker>) -> Self {
        Self::new(SEARCH_CONFLUENCE, "Search in Confluence documentation.", worker)
    }

    pub fn manage_obsidian_notes(worker: Arc<dyn Worker>) -> Self {
        Self::new(
            MANAGE_OBSIDIAN_NOTES,
            "Manage personal notes in Obsidian vault.",
            worker,
        )
    }
}

#[async_trait]
impl Tool for DelegationTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        delegation_schema()
    }

    fn validate(&self, args: &Value) -> Result<(), String> {
        DelegationArgs::deserialize(args)
            .map(|_| ())
            .map_err(|e| format!("invalid arguments: {}", e))
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<String, String> {
        let args: DelegationArgs =
            serde_json::from_value(args).map_err(|e| format!("invalid arguments: {}", e))?;
        let task = compose_task(ctx.history, &args.request);
        tracing::debug!(action = %self.name, worker = %self.worker.name(), "delegating: {}", args.request);
        self.worker
            .invoke(&task, ctx.thread_id)
            .await
            .map_err(|e| e.to_string())
    }
}

/// 子任务前拼接用户原始请求；历史中没有用户消息时原样转发
pub fn compose_task(history: &[Message], request: &str) -> String {
    match first_human_message(history) {
        Some(original) => format!(
            "User's original request:\n{}\n\nYour task:\n{}",
            original.content, request
        ),
        None => request.to_string(),
    }
}

fn delegation_schema() -> Value {
    let mut v = serde_json::to_value(schemars::schema_for!(DelegationArgs))
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}));
    if let Some(obj) = v.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    v
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::core::AgentError;

    /// 记录收到的任务
    #[derive(Default)]
    struct RecordingWorker {
        tasks: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Worker for RecordingWorker {
        fn name(&self) -> &str {
            "recording"
        }

        async fn invoke(&self, task: &str, _thread_id: &str) -> Result<String, AgentError> {
            self.tasks.lock().unwrap().push(task.to_string());
            Ok("done".to_string())
        }
    }

    #[test]
    fn test_compose_task_prepends_first_human_message() {
        let history = vec![
            Message::human("find the deployment guide"),
            Message::assistant("..."),
            Message::human("and the rollback section"),
        ];
        assert_eq!(
            compose_task(&history, "search deployment guide"),
            "User's original request:\nfind the deployment guide\n\nYour task:\nsearch deployment guide"
        );
    }

    #[test]
    fn test_compose_task_without_human_message() {
        let history = vec![Message::system("summary")];
        assert_eq!(compose_task(&history, "task"), "task");
    }

    #[test]
    fn test_schema_requires_request() {
        let schema = delegation_schema();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["request"]["type"], "string");
        assert_eq!(schema["required"], json!(["request"]));
    }

    #[tokio::test]
    async fn test_delegation_forwards_context() {
        let worker = Arc::new(RecordingWorker::default());
        let tool = DelegationTool::manage_obsidian_notes(worker.clone());
        let history = vec![Message::human("delete note Foo")];
        let out = tool
            .execute(json!({"request": "delete Foo"}), &ToolContext::new("t2", &history))
            .await
            .unwrap();
        assert_eq!(out, "done");
        let tasks = worker.tasks.lock().unwrap();
        assert!(tasks[0].starts_with("User's original request:\ndelete note Foo"));
        assert!(tasks[0].ends_with("Your task:\ndelete Foo"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_reported() {
        let tool = DelegationTool::search_confluence(Arc::new(RecordingWorker::default()));
        let err = tool
            .execute(json!({"query": "x"}), &ToolContext::new("t", &[]))
            .await
            .unwrap_err();
        assert!(err.contains("invalid arguments"));
    }

    #[test]
    fn test_validate_rejects_missing_request() {
        let tool = DelegationTool::search_confluence(Arc::new(RecordingWorker::default()));
        assert!(tool.validate(&json!({"request": "guide"})).is_ok());
        let err = tool.validate(&json!({"query": "x"})).unwrap_err();
        assert!(err.contains("missing field `request`"));
    }
}
