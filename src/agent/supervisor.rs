//! Supervisor：顶层推理+动作循环
//!
//! 动作集即委派动作。run_turn 追加用户消息后进入循环；循环因审批挂起时把待审批动作记入线程。
//! resume_turn 分两段：decide 取出挂起点，批准则执行全部动作，拒绝则为需审批的动作写入合成的拒绝结果
//! （真实动作不执行），只读动作照常执行；continue_turn 随后继续同一个循环。调用方在 decide 之后即提交线程，
//! 已执行动作的结果不会随后续推理失败一起回滚。

use std::collections::HashMap;

use crate::core::{AgentError, ApprovalGate, TurnOutcome};
use crate::memory::{ActionRequest, ActionResult, HistoryBudget, Message};
use crate::react::{execute_actions, react_loop, LoopExit, Planner, ReactSession};
use crate::session::ConversationThread;
use crate::tools::{ToolContext, ToolExecutor};

pub const SUPERVISOR_AGENT: &str = "supervisor";

pub struct Supervisor {
    planner: Planner,
    executor: ToolExecutor,
    gate: ApprovalGate,
    budget: HistoryBudget,
    max_steps: usize,
}

impl Supervisor {
    pub fn new(
        planner: Planner,
        executor: ToolExecutor,
        gate: ApprovalGate,
        budget: HistoryBudget,
        max_steps: usize,
    ) -> Self {
        Self {
            planner,
            executor,
            gate,
            budget,
            max_steps,
        }
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    pub fn action_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    /// 新一轮用户输入
    pub async fn run_turn(
        &self,
        thread: &mut ConversationThread,
        text: &str,
    ) -> Result<TurnOutcome, AgentError> {
        if thread.is_awaiting_decision() {
            return Err(AgentError::ApprovalPending(thread.id().to_string()));
        }
        let thread_id = thread.id().to_string();
        let mut messages = thread.messages().to_vec();
        messages.push(Message::human(text));

        let exit = self.drive(&thread_id, &mut messages).await?;
        commit(thread, messages, exit)
    }

    /// 对挂起的动作作出决定后继续
    pub async fn resume_turn(
        &self,
        thread: &mut ConversationThread,
        approved: bool,
    ) -> Result<TurnOutcome, AgentError> {
        self.decide(thread, approved).await?;
        self.continue_turn(thread).await
    }

    /// 取出挂起点并处理待审批动作，结果写入线程：批准则执行全部动作，
    /// 拒绝则需审批的动作得到合成的拒绝结果，只读动作照常执行
    pub async fn decide(
        &self,
        thread: &mut ConversationThread,
        approved: bool,
    ) -> Result<(), AgentError> {
        let thread_id = thread.id().to_string();
        let suspension = thread
            .take_suspension()
            .ok_or_else(|| AgentError::NoPendingApproval(thread_id.clone()))?;
        let mut messages = thread.messages().to_vec();

        if approved {
            tracing::info!(thread = %thread_id, count = suspension.actions.len(), "actions approved");
            execute_actions(&self.executor, &thread_id, &mut messages, &suspension.actions).await;
        } else {
            tracing::info!(thread = %thread_id, count = suspension.actions.len(), "actions rejected");
            let results = self
                .reject(&thread_id, &messages, &suspension.actions)
                .await;
            messages.extend(results.into_iter().map(Message::action_result));
        }
        thread.replace_history(messages);
        Ok(())
    }

    /// 决定写入后，在现有历史上继续循环
    pub async fn continue_turn(
        &self,
        thread: &mut ConversationThread,
    ) -> Result<TurnOutcome, AgentError> {
        if thread.is_awaiting_decision() {
            return Err(AgentError::ApprovalPending(thread.id().to_string()));
        }
        let thread_id = thread.id().to_string();
        let mut messages = thread.messages().to_vec();
        let exit = self.drive(&thread_id, &mut messages).await?;
        commit(thread, messages, exit)
    }

    async fn drive(
        &self,
        thread_id: &str,
        messages: &mut Vec<Message>,
    ) -> Result<LoopExit, AgentError> {
        let session = ReactSession::new(&self.planner, &self.executor, self.max_steps, thread_id)
            .with_gate(&self.gate)
            .with_budget(&self.budget);
        react_loop(&session, messages).await
    }

    /// 拒绝：需审批的动作得到合成结果，只读动作照常执行；结果按提出顺序排列
    async fn reject(
        &self,
        thread_id: &str,
        history: &[Message],
        actions: &[ActionRequest],
    ) -> Vec<ActionResult> {
        let free: Vec<ActionRequest> = actions
            .iter()
            .filter(|a| !self.gate.requires_approval(a))
            .cloned()
            .collect();
        let ctx = ToolContext::new(thread_id, history);
        let mut executed: HashMap<String, ActionResult> = self
            .executor
            .execute_all(&free, &ctx)
            .await
            .into_iter()
            .map(|r| (r.action_id.clone(), r))
            .collect();

        actions
            .iter()
            .map(|a| {
                executed
                    .remove(&a.id)
                    .unwrap_or_else(|| ActionResult::rejected(a))
            })
            .collect()
    }
}

/// 写回草稿线程；循环挂起时记录挂起点
fn commit(
    thread: &mut ConversationThread,
    messages: Vec<Message>,
    exit: LoopExit,
) -> Result<TurnOutcome, AgentError> {
    thread.replace_history(messages);
    if let LoopExit::Suspended(actions) = exit {
        thread.suspend(actions)?;
    }
    Ok(TurnOutcome::from_messages(thread.messages()))
}
