//! 人工审批闸门
//!
//! 状态：Running -> AwaitingDecision ->（批准）Running |（拒绝）Rejected -> Complete / Error。
//! 仅当配置开启审批、且动作不在只读列表中时才挂起；挂起的动作写入 ConversationThread，
//! 后续 resume 调用据此执行或拒绝，被拒绝的动作永远不会到达能力服务器。

use std::collections::HashSet;

use serde::Serialize;

use crate::memory::ActionRequest;

/// 闸门状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Running,
    AwaitingDecision,
    Rejected,
    Complete,
    Error,
}

/// 对一步提出的动作的检查结果
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// 直接执行
    Proceed,
    /// 挂起整步，等待人工决定
    Suspend(Vec<ActionRequest>),
}

/// 审批闸门：开关 + 只读动作白名单（只读动作不需要审批）
#[derive(Debug, Clone, Default)]
pub struct ApprovalGate {
    enabled: bool,
    read_only: HashSet<String>,
}

impl ApprovalGate {
    pub fn new(enabled: bool, read_only_actions: impl IntoIterator<Item = String>) -> Self {
        Self {
            enabled,
            read_only: read_only_actions.into_iter().collect(),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn requires_approval(&self, action: &ActionRequest) -> bool {
        self.enabled && !self.read_only.contains(&action.name)
    }

    /// 任一动作需要审批则整步挂起（同一条助手消息中的动作一起等待决定）
    pub fn check(&self, actions: &[ActionRequest]) -> GateDecision {
        if actions.iter().any(|a| self.requires_approval(a)) {
            GateDecision::Suspend(actions.to_vec())
        } else {
            GateDecision::Proceed
        }
    }
}
