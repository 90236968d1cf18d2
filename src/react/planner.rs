//! Planner：单步推理
//!
//! 拼 system prompt + 历史 + 可用动作后调用 LLM，得到最终回复或动作请求；另提供历史摘要（压缩用）。

use std::sync::Arc;

use crate::core::AgentError;
use crate::llm::{ActionSpec, LlmClient, LlmRequest, LlmResponse};
use crate::memory::{Message, Role};

/// 摘要请求使用的 agent 名
pub const SUMMARIZER_AGENT: &str = "summarizer";

const SUMMARY_PROMPT: &str = "You compress conversation history. Summarize the conversation below, \
keeping the user's goals, decisions made, facts retrieved by tools and any open questions. \
Reply with the summary only.";

/// Planner：持有 LLM 与 system prompt
pub struct Planner {
    agent: String,
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(
        agent: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn base_system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn plan(
        &self,
        messages: &[Message],
        actions: Vec<ActionSpec>,
    ) -> Result<LlmResponse, AgentError> {
        let request = LlmRequest::new(&self.agent, &self.system_prompt, messages.to_vec())
            .with_actions(actions);
        Ok(self.llm.complete(&request).await?)
    }

    /// 将一段历史压缩为摘要文本
    pub async fn summarize(&self, messages: &[Message]) -> Result<String, AgentError> {
        let transcript = render_transcript(messages);
        let request = LlmRequest::new(
            SUMMARIZER_AGENT,
            SUMMARY_PROMPT,
            vec![Message::human(transcript)],
        );
        match self.llm.complete(&request).await? {
            LlmResponse::Text(summary) => Ok(summary.trim().to_string()),
            LlmResponse::Actions { content, .. } => Ok(content.trim().to_string()),
        }
    }
}

fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        let role = match m.role {
            Role::System => "System",
            Role::Human => "User",
            Role::Assistant => "Assistant",
            Role::ActionResult => "Action result",
        };
        if !m.content.is_empty() {
            out.push_str(&format!("{}: {}\n", role, m.content));
        }
        for a in &m.action_requests {
            out.push_str(&format!("{} requested {}({})\n", role, a.name, a.args));
        }
    }
    out
}
