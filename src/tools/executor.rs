//! 工具执行器
//!
//! 持有 ToolRegistry、单次调用超时与退避策略：execute 在超时内调用工具，瞬时失败按 BackoffPolicy 重试，
//! 重试耗尽后返回失败的 ActionResult（不上抛），由上层推理循环把失败讲给用户；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::time::timeout;

use crate::core::{AgentError, BackoffPolicy, RecoveryAction, RecoveryEngine};
use crate::llm::ActionSpec;
use crate::memory::{ActionRequest, ActionResult};
use crate::tools::{ToolContext, ToolRegistry};

/// 工具执行器：对每次调用施加超时与退避重试，并将结果映射为 ActionResult
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    backoff: BackoffPolicy,
    recovery: RecoveryEngine,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            backoff: BackoffPolicy::none(),
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// 执行单个动作；失败时按退避策略重试，最终失败转为 success=false 的 ActionResult
    pub async fn execute(&self, request: &ActionRequest, ctx: &ToolContext<'_>) -> ActionResult {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        let result = loop {
            attempt += 1;
            match self.execute_once(request, ctx).await {
                Ok(content) => break Ok(content),
                Err(e) => {
                    let retryable = matches!(
                        self.recovery.handle_tool(&e),
                        RecoveryAction::RetryWithBackoff
                    );
                    if !retryable || attempt >= self.backoff.max_attempts {
                        break Err(e);
                    }
                    let delay = self.backoff.delay_for(attempt);
                    tracing::warn!(
                        tool = %request.name,
                        attempt,
                        max_attempts = self.backoff.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "action failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(AgentError::ToolTimeout(_)) => "timeout",
            Err(AgentError::HallucinatedTool(_)) => "unknown_tool",
            Err(AgentError::InvalidArguments { .. }) => "invalid_args",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "thread": ctx.thread_id,
            "tool": request.name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "attempts": attempt,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&request.args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(content) => ActionResult::success(request, content),
            Err(e) => ActionResult::failure(request, e.to_string()),
        }
    }

    /// 同一步的多个动作并发执行，结果按请求顺序返回
    pub async fn execute_all(
        &self,
        requests: &[ActionRequest],
        ctx: &ToolContext<'_>,
    ) -> Vec<ActionResult> {
        join_all(requests.iter().map(|r| self.execute(r, ctx))).await
    }

    async fn execute_once(
        &self,
        request: &ActionRequest,
        ctx: &ToolContext<'_>,
    ) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(&request.name)
            .ok_or_else(|| AgentError::HallucinatedTool(request.name.clone()))?;
        tool.validate(&request.args).map_err(|message| AgentError::InvalidArguments {
            tool: request.name.clone(),
            message,
        })?;

        match timeout(self.timeout, tool.execute(request.args.clone(), ctx)).await {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(request.name.clone())),
        }
    }

    pub fn action_specs(&self) -> Vec<ActionSpec> {
        self.registry.action_specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::tools::{EchoTool, Tool};

    struct FailingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "always_fails"
        }

        fn description(&self) -> &str {
            "fails"
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext<'_>) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("service unavailable".to_string())
        }
    }

    /// 要求 {"id": 整数} 的工具
    struct StrictTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for StrictTool {
        fn name(&self) -> &str {
            "strict"
        }

        fn description(&self) -> &str {
            "needs an id"
        }

        fn validate(&self, args: &Value) -> Result<(), String> {
            match args.get("id").and_then(Value::as_u64) {
                Some(_) => Ok(()),
                None => Err("missing field `id`".to_string()),
            }
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext<'_>) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let executor = ToolExecutor::new(registry, 5);
        let req = ActionRequest::new("echo", json!({"text": "hi"}));
        let result = executor.execute(&req, &ToolContext::new("t", &[])).await;
        assert!(result.success);
        assert_eq!(result.content, "hi");
        assert_eq!(result.action_id, req.id);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_retried() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5).with_backoff(BackoffPolicy::default());
        let req = ActionRequest::new("fake_tool", json!({}));
        let result = executor.execute(&req, &ToolContext::new("t", &[])).await;
        assert!(!result.success);
        assert!(result.content.contains("fake_tool"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_become_failed_result() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool { calls: calls.clone() });
        let executor = ToolExecutor::new(registry, 5).with_backoff(BackoffPolicy::new(
            3,
            Duration::from_millis(100),
            2.0,
        ));
        let req = ActionRequest::new("always_fails", json!({}));
        let result = executor.execute(&req, &ToolContext::new("t", &[])).await;
        assert!(!result.success);
        assert!(result.content.contains("service unavailable"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_arguments_fail_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(StrictTool { calls: calls.clone() });
        let executor = ToolExecutor::new(registry, 5).with_backoff(BackoffPolicy::default());

        let start = tokio::time::Instant::now();
        let req = ActionRequest::new("strict", json!({"name": "x"}));
        let result = executor.execute(&req, &ToolContext::new("t", &[])).await;
        assert!(!result.success);
        assert!(result.content.contains("Invalid arguments for strict"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(start.elapsed() < Duration::from_millis(10));

        let req = ActionRequest::new("strict", json!({"id": 7}));
        assert!(executor.execute(&req, &ToolContext::new("t", &[])).await.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_all_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let executor = ToolExecutor::new(registry, 5);
        let reqs = vec![
            ActionRequest::new("echo", json!({"text": "a"})),
            ActionRequest::new("echo", json!({"text": "b"})),
        ];
        let results = executor.execute_all(&reqs, &ToolContext::new("t", &[])).await;
        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }
}
