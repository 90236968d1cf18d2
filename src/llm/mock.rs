//! Mock LLM 客户端（用于测试与无 API Key 时的本地运行）
//!
//! 可按智能体名预置脚本化响应；脚本用尽时回显最后一条用户消息。记录每次请求，便于断言温度与调用次数。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, LlmRequest, LlmResponse};

type Script = VecDeque<Result<LlmResponse, LlmError>>;

/// Mock 客户端：脚本化响应 + 请求记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    /// agent 名 -> 响应队列
    scripts: Mutex<HashMap<String, Script>>,
    /// 未按 agent 指定时使用的队列
    fallback: Mutex<Script>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有 agent 共用的响应队列
    pub fn scripted(responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        let client = Self::default();
        client
            .fallback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(responses);
        client
    }

    /// 为指定 agent 追加响应
    pub fn script(self, agent: &str, responses: Vec<Result<LlmResponse, LlmError>>) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(agent.to_string())
            .or_default()
            .extend(responses);
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 每次请求使用的温度（按调用顺序）
    pub fn temperatures(&self) -> Vec<Option<f32>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|r| r.temperature)
            .collect()
    }

    fn next_scripted(&self, agent: &str) -> Option<Result<LlmResponse, LlmError>> {
        let by_agent = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(agent)
            .and_then(|q| q.pop_front());
        by_agent.or_else(|| {
            self.fallback
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
        })
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(scripted) = self.next_scripted(&request.agent) {
            return scripted;
        }

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.is_human())
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(LlmResponse::Text(format!("Echo from Mock: {}", last_user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Message;

    #[tokio::test]
    async fn test_mock_echoes_when_script_empty() {
        let mock = MockLlmClient::new();
        let req = LlmRequest::new("supervisor", "sys", vec![Message::human("hello")]);
        let resp = mock.complete(&req).await.unwrap();
        assert_eq!(resp, LlmResponse::Text("Echo from Mock: hello".to_string()));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_prefers_agent_script() {
        let mock = MockLlmClient::scripted(vec![Ok(LlmResponse::Text("fallback".into()))])
            .script("worker", vec![Ok(LlmResponse::Text("worker".into()))]);
        let worker = LlmRequest::new("worker", "sys", vec![]);
        let other = LlmRequest::new("supervisor", "sys", vec![]);
        assert_eq!(mock.complete(&worker).await.unwrap(), LlmResponse::Text("worker".into()));
        assert_eq!(mock.complete(&other).await.unwrap(), LlmResponse::Text("fallback".into()));
    }
}
