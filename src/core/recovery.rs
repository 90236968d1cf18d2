//! 错误恢复引擎
//!
//! 将失败分类为 RecoveryAction：推理后端错误按字符串中的关键字判断是否属于「结构化输出解析失败」，
//! 动作执行错误中超时与执行失败视为瞬时故障，其余直接终止。

use crate::core::{AgentError, RecoveryAction};
use crate::llm::LlmError;

/// 默认的解析类错误关键字（匹配错误字符串的小写形式）
pub const PARSING_ERROR_KEYWORDS: &[&str] = &[
    "parse",
    "json",
    "tool",
    "function",
    "schema",
    "validation",
    "malformed",
];

/// 语义化错误分类：推理失败 -> 扰动重试 / 终止；动作失败 -> 退避重试 / 终止
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    parse_keywords: Vec<String>,
}

impl RecoveryEngine {
    pub fn new() -> Self {
        Self::with_keywords(PARSING_ERROR_KEYWORDS.iter().map(|k| k.to_string()))
    }

    pub fn with_keywords(keywords: impl IntoIterator<Item = String>) -> Self {
        Self {
            parse_keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// 错误字符串是否命中任一解析类关键字
    pub fn is_malformed_output(&self, err: &LlmError) -> bool {
        let text = err.to_string().to_lowercase();
        self.parse_keywords.iter().any(|kw| text.contains(kw.as_str()))
    }

    pub fn handle_llm(&self, err: &LlmError) -> RecoveryAction {
        if self.is_malformed_output(err) {
            RecoveryAction::RetryWithPerturbation
        } else {
            RecoveryAction::Abort
        }
    }

    pub fn handle_tool(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::ToolExecutionFailed(_) | AgentError::ToolTimeout(_) => {
                RecoveryAction::RetryWithBackoff
            }
            AgentError::Capability(_) => RecoveryAction::RetryWithBackoff,
            AgentError::HallucinatedTool(_) | AgentError::InvalidArguments { .. } => {
                RecoveryAction::Abort
            }
            _ => RecoveryAction::Abort,
        }
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_json_schema_error() {
        let engine = RecoveryEngine::new();
        let err = LlmError::ApiError("Invalid JSON schema in tool arguments".to_string());
        assert_eq!(engine.handle_llm(&err), RecoveryAction::RetryWithPerturbation);
    }

    #[test]
    fn test_recovery_malformed_output() {
        let engine = RecoveryEngine::new();
        let err = LlmError::MalformedOutput("unexpected end of input".to_string());
        assert!(engine.is_malformed_output(&err));
    }

    #[test]
    fn test_recovery_connection_refused() {
        let engine = RecoveryEngine::new();
        let err = LlmError::Network("connection refused".to_string());
        assert_eq!(engine.handle_llm(&err), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_rate_limited() {
        let engine = RecoveryEngine::new();
        let err = LlmError::RateLimited { retry_after_ms: 1000 };
        assert_eq!(engine.handle_llm(&err), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_custom_keywords() {
        let engine = RecoveryEngine::with_keywords(vec!["Garbled".to_string()]);
        assert!(engine.is_malformed_output(&LlmError::ApiError("garbled reply".into())));
        assert!(!engine.is_malformed_output(&LlmError::ApiError("json error".into())));
    }

    #[test]
    fn test_recovery_tool_failures() {
        let engine = RecoveryEngine::new();
        assert_eq!(
            engine.handle_tool(&AgentError::ToolTimeout("search".into())),
            RecoveryAction::RetryWithBackoff
        );
        assert_eq!(
            engine.handle_tool(&AgentError::ToolExecutionFailed("503".into())),
            RecoveryAction::RetryWithBackoff
        );
        assert_eq!(
            engine.handle_tool(&AgentError::HallucinatedTool("fake_tool".into())),
            RecoveryAction::Abort
        );
        assert_eq!(
            engine.handle_tool(&AgentError::InvalidArguments {
                tool: "search_confluence".into(),
                message: "missing field `request`".into(),
            }),
            RecoveryAction::Abort
        );
    }
}
