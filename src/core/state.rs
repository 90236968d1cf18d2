//! 单轮结果：TurnOutcome
//!
//! 每次 run / resume 结束时由最终消息序列推导，不单独存储。

use serde::Serialize;

use crate::core::{AgentError, GateState};
use crate::memory::{ActionRequest, Message, Role};

/// 一轮（run 或 resume）的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Complete { content: String },
    PendingApproval { actions: Vec<ActionRequest> },
    Error { content: String },
}

impl TurnOutcome {
    /// 从消息序列分类：最近一条助手消息带动作则为待审批；
    /// 否则从后往前第一条不带动作的助手消息即为回答。
    pub fn from_messages(messages: &[Message]) -> Self {
        if messages.is_empty() {
            return Self::Error {
                content: "No messages in result".to_string(),
            };
        }

        let mut assistants = messages.iter().rev().filter(|m| m.role == Role::Assistant);
        match assistants.next() {
            Some(latest) if latest.has_actions() => Self::PendingApproval {
                actions: latest.action_requests.clone(),
            },
            Some(latest) => Self::Complete {
                content: latest.content.clone(),
            },
            None => Self::Error {
                content: "Could not get response".to_string(),
            },
        }
    }

    pub fn from_error(err: &AgentError) -> Self {
        Self::Error {
            content: err.to_string(),
        }
    }

    pub fn gate_state(&self) -> GateState {
        match self {
            Self::Complete { .. } => GateState::Complete,
            Self::PendingApproval { .. } => GateState::AwaitingDecision,
            Self::Error { .. } => GateState::Error,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingApproval { .. })
    }

    /// 用于展示的文本
    pub fn content(&self) -> String {
        match self {
            Self::Complete { content } | Self::Error { content } => content.clone(),
            Self::PendingApproval { actions } => {
                let names: Vec<&str> = actions.iter().map(|a| a.name.as_str()).collect();
                format!("Actions require approval: {}", names.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ActionResult;
    use serde_json::json;

    #[test]
    fn test_outcome_complete_uses_latest_answer() {
        let messages = vec![
            Message::human("hi"),
            Message::assistant("old answer"),
            Message::human("again"),
            Message::assistant("new answer"),
        ];
        assert_eq!(
            TurnOutcome::from_messages(&messages),
            TurnOutcome::Complete { content: "new answer".into() }
        );
    }

    #[test]
    fn test_outcome_pending_overrides_older_answers() {
        let req = ActionRequest::new("manage_obsidian_notes", json!({"request": "delete Foo"}));
        let messages = vec![
            Message::human("hi"),
            Message::assistant("hello"),
            Message::human("delete note Foo"),
            Message::assistant_with_actions("", vec![req.clone()]),
        ];
        assert_eq!(
            TurnOutcome::from_messages(&messages),
            TurnOutcome::PendingApproval { actions: vec![req] }
        );
    }

    #[test]
    fn test_outcome_answer_after_action_results() {
        let req = ActionRequest::new("search_confluence", json!({"request": "guide"}));
        let messages = vec![
            Message::human("find the guide"),
            Message::assistant_with_actions("", vec![req.clone()]),
            Message::action_result(ActionResult::success(&req, "page X")),
            Message::assistant("Guide found at page X"),
        ];
        assert!(TurnOutcome::from_messages(&messages).is_complete());
    }

    #[test]
    fn test_outcome_errors() {
        assert!(matches!(TurnOutcome::from_messages(&[]), TurnOutcome::Error { .. }));
        let only_human = vec![Message::human("hi")];
        assert_eq!(
            TurnOutcome::from_messages(&only_human),
            TurnOutcome::Error { content: "Could not get response".into() }
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let req = ActionRequest::with_id("manage_obsidian_notes", json!({"request": "x"}), "call_1");
        let pending = TurnOutcome::PendingApproval { actions: vec![req] };
        assert_eq!(
            serde_json::to_value(&pending).unwrap(),
            json!({
                "status": "pending_approval",
                "actions": [{"name": "manage_obsidian_notes", "args": {"request": "x"}, "id": "call_1"}]
            })
        );
        let done = TurnOutcome::Complete { content: "ok".into() };
        assert_eq!(
            serde_json::to_value(&done).unwrap(),
            json!({"status": "complete", "content": "ok"})
        );
    }
}
