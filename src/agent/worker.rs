//! WorkerAgent：单一能力域内的推理+动作循环
//!
//! 动作集为构图时从能力服务器拉取的实时列表，系统提示词按领域区分；不感知审批闸门，也不再向下委派。

use async_trait::async_trait;

use crate::core::AgentError;
use crate::memory::Message;
use crate::react::{react_loop, LoopExit, Planner, ReactSession};
use crate::tools::ToolExecutor;

pub const DOCUMENT_WORKER: &str = "confluence_agent";
pub const NOTES_WORKER: &str = "obsidian_agent";

/// 可被委派的子智能体
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    /// 以全新的消息列表执行任务，返回最终文本回复
    async fn invoke(&self, task: &str, thread_id: &str) -> Result<String, AgentError>;
}

pub struct WorkerAgent {
    planner: Planner,
    executor: ToolExecutor,
    max_steps: usize,
}

impl WorkerAgent {
    pub fn new(planner: Planner, executor: ToolExecutor, max_steps: usize) -> Self {
        Self {
            planner,
            executor,
            max_steps,
        }
    }

    pub fn action_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }
}

#[async_trait]
impl Worker for WorkerAgent {
    fn name(&self) -> &str {
        self.planner.agent()
    }

    async fn invoke(&self, task: &str, thread_id: &str) -> Result<String, AgentError> {
        tracing::debug!(worker = %self.name(), thread = %thread_id, "worker task started");
        let mut messages = vec![Message::human(task)];
        let session = ReactSession::new(&self.planner, &self.executor, self.max_steps, thread_id);
        match react_loop(&session, &mut messages).await? {
            LoopExit::Finished(answer) => Ok(answer),
            LoopExit::Suspended(_) => Err(AgentError::ToolExecutionFailed(format!(
                "worker '{}' cannot suspend for approval",
                self.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient};
    use crate::memory::ActionRequest;
    use crate::tools::{EchoTool, ToolRegistry};

    #[tokio::test]
    async fn test_worker_runs_its_own_loop() {
        let mock = Arc::new(MockLlmClient::new().script(
            DOCUMENT_WORKER,
            vec![
                Ok(LlmResponse::Actions {
                    content: String::new(),
                    requests: vec![ActionRequest::new("echo", json!({"text": "page X"}))],
                }),
                Ok(LlmResponse::Text("Guide found at page X".into())),
            ],
        ));
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let worker = WorkerAgent::new(
            Planner::new(DOCUMENT_WORKER, mock.clone(), "docs"),
            ToolExecutor::new(registry, 5),
            5,
        );

        let answer = worker.invoke("find the deployment guide", "t1").await.unwrap();
        assert_eq!(answer, "Guide found at page X");
        assert_eq!(worker.action_names(), vec!["echo".to_string()]);
        // 每次调用都从只含任务的新消息列表开始
        assert_eq!(mock.requests()[0].messages.len(), 1);
        assert_eq!(mock.requests()[0].actions[0].name, "echo");
    }
}
