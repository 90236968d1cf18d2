//! 对话消息模型
//!
//! Message / ActionRequest / ActionResult：线程历史中的每一条记录。消息追加后不可变，
//! 助手消息可携带按顺序排列的 ActionRequest，动作结果以 ActionResult 角色写回。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Human,
    Assistant,
    ActionResult,
}

/// 推理后端提出的一次动作调用：动作名、结构化参数、唯一 id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    pub args: Value,
    pub id: String,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
        }
    }

    pub fn with_id(name: impl Into<String>, args: Value, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args,
            id: id.into(),
        }
    }
}

/// 动作执行结果：对应的 action id、返回内容、是否成功
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub name: String,
    pub content: String,
    pub success: bool,
}

impl ActionResult {
    pub fn success(request: &ActionRequest, content: impl Into<String>) -> Self {
        Self {
            action_id: request.id.clone(),
            name: request.name.clone(),
            content: content.into(),
            success: true,
        }
    }

    pub fn failure(request: &ActionRequest, reason: impl Into<String>) -> Self {
        Self {
            action_id: request.id.clone(),
            name: request.name.clone(),
            content: format!("Error: {}", reason.into()),
            success: false,
        }
    }

    /// 人工拒绝时的合成结果：动作本身从未执行
    pub fn rejected(request: &ActionRequest) -> Self {
        Self {
            action_id: request.id.clone(),
            name: request.name.clone(),
            content: format!(
                "Action '{}' was rejected by the user and was not executed.",
                request.name
            ),
            success: false,
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_requests: Vec<ActionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_result: Option<ActionResult>,
}

impl Message {
    fn plain(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            action_requests: Vec::new(),
            action_result: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::plain(Role::Human, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content.into())
    }

    /// 助手提出动作（content 可为空）
    pub fn assistant_with_actions(content: impl Into<String>, actions: Vec<ActionRequest>) -> Self {
        Self {
            action_requests: actions,
            ..Self::plain(Role::Assistant, content.into())
        }
    }

    pub fn action_result(result: ActionResult) -> Self {
        Self {
            role: Role::ActionResult,
            content: result.content.clone(),
            action_requests: Vec::new(),
            action_result: Some(result),
        }
    }

    pub fn is_human(&self) -> bool {
        self.role == Role::Human
    }

    /// 助手消息且携带待执行动作
    pub fn has_actions(&self) -> bool {
        self.role == Role::Assistant && !self.action_requests.is_empty()
    }
}

/// 线程中第一条用户消息（委派时作为原始请求注入 Worker）
pub fn first_human_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().find(|m| m.is_human())
}
