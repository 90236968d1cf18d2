//! 推理后端抽象
//!
//! 请求 = 消息历史 + 可用动作 schema + 采样温度；响应 = 最终文本，或按顺序排列的动作请求。
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient；失败以 LlmError 返回，其字符串形式供 RecoveryEngine 分类。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::{ActionRequest, Message};

/// 动作描述：名称、说明、参数 JSON Schema（供推理后端选择与生成参数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 一次推理请求
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// 发起请求的智能体名（supervisor / confluence_agent / obsidian_agent）
    pub agent: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub actions: Vec<ActionSpec>,
    /// 为 None 时使用后端默认温度
    pub temperature: Option<f32>,
}

impl LlmRequest {
    pub fn new(agent: impl Into<String>, system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            agent: agent.into(),
            system_prompt: system_prompt.into(),
            messages,
            actions: Vec::new(),
            temperature: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionSpec>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..self.clone()
        }
    }
}

/// 推理响应：最终回复，或需要执行的动作列表
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    Text(String),
    Actions {
        content: String,
        requests: Vec<ActionRequest>,
    },
}

/// 推理后端错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    /// 结构化输出无法解析（工具参数非 JSON、响应结构不符等）
    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited (retry after {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
