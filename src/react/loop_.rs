//! 推理+动作主循环
//!
//! Plan -> 若为最终回复则结束；若为动作请求则经审批闸门检查，需要审批时挂起返回，否则执行并写回结果后进入下一步。
//! Supervisor 与 Worker 共用此循环：Worker 不挂闸门、不做历史压缩。每次调用的步数上限独立计算。

use crate::core::{AgentError, ApprovalGate, GateDecision};
use crate::llm::LlmResponse;
use crate::memory::{ActionRequest, HistoryBudget, Message};
use crate::react::Planner;
use crate::tools::{ToolContext, ToolExecutor};

/// 循环结束方式
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    /// 得到不带动作的最终回复
    Finished(String),
    /// 提出的动作需要人工审批，尚未执行
    Suspended(Vec<ActionRequest>),
}

/// 循环配置
pub struct ReactSession<'a> {
    /// Planner（必需）
    pub planner: &'a Planner,
    /// 工具执行器（必需）
    pub executor: &'a ToolExecutor,
    /// 最大推理步数
    pub max_steps: usize,
    /// 所在线程（审计日志、委派上下文）
    pub thread_id: &'a str,
    /// 可选：审批闸门
    pub gate: Option<&'a ApprovalGate>,
    /// 可选：历史压缩预算
    pub budget: Option<&'a HistoryBudget>,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        planner: &'a Planner,
        executor: &'a ToolExecutor,
        max_steps: usize,
        thread_id: &'a str,
    ) -> Self {
        Self {
            planner,
            executor,
            max_steps,
            thread_id,
            gate: None,
            budget: None,
        }
    }

    /// 设置审批闸门
    pub fn with_gate(mut self, gate: &'a ApprovalGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 设置历史压缩预算
    pub fn with_budget(mut self, budget: &'a HistoryBudget) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// 执行循环，直到最终回复、挂起或超出步数上限（RecursionLimit）
pub async fn react_loop(
    session: &ReactSession<'_>,
    messages: &mut Vec<Message>,
) -> Result<LoopExit, AgentError> {
    let agent = session.planner.agent();

    for step in 1..=session.max_steps {
        if let Some(budget) = session.budget {
            compact_context(session.planner, messages, budget).await;
        }

        let response = session
            .planner
            .plan(messages, session.executor.action_specs())
            .await?;

        let (content, requests) = match response {
            LlmResponse::Text(text) => (text, Vec::new()),
            LlmResponse::Actions { content, requests } => (content, requests),
        };

        if requests.is_empty() {
            tracing::debug!(agent, step, "final answer");
            messages.push(Message::assistant(content.clone()));
            return Ok(LoopExit::Finished(content));
        }

        let names: Vec<&str> = requests.iter().map(|r| r.name.as_str()).collect();
        tracing::info!(agent, step, actions = ?names, "actions proposed");
        messages.push(Message::assistant_with_actions(content, requests.clone()));

        if let Some(gate) = session.gate {
            if let GateDecision::Suspend(pending) = gate.check(&requests) {
                tracing::info!(agent, thread = %session.thread_id, "awaiting approval");
                return Ok(LoopExit::Suspended(pending));
            }
        }

        execute_actions(session.executor, session.thread_id, messages, &requests).await;
    }

    tracing::error!(agent, max_steps = session.max_steps, "recursion limit reached");
    Err(AgentError::RecursionLimit(session.max_steps))
}

/// 执行一组动作并按提出顺序追加结果
pub async fn execute_actions(
    executor: &ToolExecutor,
    thread_id: &str,
    messages: &mut Vec<Message>,
    requests: &[ActionRequest],
) {
    let results = {
        let ctx = ToolContext::new(thread_id, messages.as_slice());
        executor.execute_all(requests, &ctx).await
    };
    messages.extend(results.into_iter().map(Message::action_result));
}

/// Context Compaction：历史超出预算时，将较早部分替换为一条摘要型 system 消息，保留最近若干条原文。
/// 第一条用户消息（原始请求）始终以原文保留在最前，委派时仍能找到它。
/// 摘要失败只记录日志，本步按未压缩历史继续。
pub async fn compact_context(
    planner: &Planner,
    messages: &mut Vec<Message>,
    budget: &HistoryBudget,
) -> bool {
    let Some(split) = budget.split_point(messages) else {
        return false;
    };
    let original = messages[..split].iter().position(Message::is_human);
    if split == 1 && original == Some(0) {
        return false;
    }

    match planner.summarize(&messages[..split]).await {
        Ok(summary) if !summary.is_empty() => {
            let tail = messages.split_off(split);
            let mut compacted = Vec::with_capacity(tail.len() + 2);
            if let Some(idx) = original {
                compacted.push(messages.swap_remove(idx));
            }
            compacted.push(Message::system(format!(
                "Previous conversation summary:\n\n{}",
                summary
            )));
            let kept = tail.len();
            compacted.extend(tail);
            tracing::info!(summarized = split, kept, "history compacted");
            *messages = compacted;
            true
        }
        Ok(_) => false,
        Err(e) => {
            tracing::warn!("history compaction failed, continuing uncompacted: {}", e);
            false
        }
    }
}
