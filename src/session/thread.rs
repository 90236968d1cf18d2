//! 对话线程
//!
//! 有序消息序列 + 挂起标记（待审批的动作列表）。挂起数据即 resume 所需的全部续行信息：
//! 最后一条助手消息携带的动作，以及它们在历史中的位置（历史末尾）。

use chrono::{DateTime, Utc};

use crate::core::{AgentError, GateState};
use crate::memory::{ActionRequest, Message};

/// 挂起点：等待人工决定的动作
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
    pub actions: Vec<ActionRequest>,
    pub proposed_at: DateTime<Utc>,
}

/// 单个对话线程
#[derive(Debug, Clone)]
pub struct ConversationThread {
    id: String,
    messages: Vec<Message>,
    suspension: Option<Suspension>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationThread {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            suspension: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.touch();
    }

    /// 历史压缩后整体替换（唯一的非追加修改，只发生在两步推理之间）
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.touch();
    }

    /// 记录挂起点；已有挂起时拒绝，保证每个线程至多一个未决审批
    pub fn suspend(&mut self, actions: Vec<ActionRequest>) -> Result<(), AgentError> {
        if self.suspension.is_some() {
            return Err(AgentError::ApprovalPending(self.id.clone()));
        }
        self.suspension = Some(Suspension {
            actions,
            proposed_at: Utc::now(),
        });
        self.touch();
        Ok(())
    }

    /// 取出挂起点（resume 时调用）
    pub fn take_suspension(&mut self) -> Option<Suspension> {
        let taken = self.suspension.take();
        if taken.is_some() {
            self.touch();
        }
        taken
    }

    pub fn pending_actions(&self) -> Option<&[ActionRequest]> {
        self.suspension.as_ref().map(|s| s.actions.as_slice())
    }

    pub fn is_awaiting_decision(&self) -> bool {
        self.suspension.is_some()
    }

    /// 两次调用之间线程只可能处于等待决定或空闲（上一轮已结束）
    pub fn gate_state(&self) -> GateState {
        if self.is_awaiting_decision() {
            GateState::AwaitingDecision
        } else {
            GateState::Complete
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suspend_only_once() {
        let mut thread = ConversationThread::new("t1");
        let action = ActionRequest::new("manage_obsidian_notes", json!({"request": "x"}));
        thread.suspend(vec![action.clone()]).unwrap();
        assert!(thread.is_awaiting_decision());
        assert_eq!(thread.gate_state(), GateState::AwaitingDecision);

        let err = thread.suspend(vec![action]).unwrap_err();
        assert!(matches!(err, AgentError::ApprovalPending(id) if id == "t1"));
    }

    #[test]
    fn test_take_suspension_clears_marker() {
        let mut thread = ConversationThread::new("t1");
        let action = ActionRequest::new("search_confluence", json!({"request": "x"}));
        thread.suspend(vec![action.clone()]).unwrap();
        let suspension = thread.take_suspension().unwrap();
        assert_eq!(suspension.actions, vec![action]);
        assert!(thread.take_suspension().is_none());
        assert_eq!(thread.gate_state(), GateState::Complete);
    }

    #[test]
    fn test_push_keeps_order() {
        let mut thread = ConversationThread::new("t1");
        thread.push(Message::human("a"));
        thread.extend(vec![Message::assistant("b"), Message::human("c")]);
        let contents: Vec<&str> = thread.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
        assert!(thread.updated_at() >= thread.created_at());
    }
}
