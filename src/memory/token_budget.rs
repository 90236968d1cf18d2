//! Token 预算：历史压缩触发条件
//!
//! 对话历史估算 token 超过 trigger 时触发压缩，至少保留最近 keep 条原始消息。

use crate::memory::{Message, Role};

/// 单条消息的固定开销（角色、分隔符等）
const PER_MESSAGE_OVERHEAD: usize = 4;

/// Token 估算器（简单的字符计数近似）
pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量
    /// 使用简单的启发式规则：英文约 4 字符/token，中文约 1.5 字符/token
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0;
        let mut non_ascii_chars = 0;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }

    /// 估算一条消息（含动作参数）的 token 数量
    pub fn estimate_message(message: &Message) -> usize {
        let actions: usize = message
            .action_requests
            .iter()
            .map(|a| Self::estimate(&a.name) + Self::estimate(&a.args.to_string()))
            .sum();
        Self::estimate(&message.content) + actions + PER_MESSAGE_OVERHEAD
    }

    pub fn estimate_messages(messages: &[Message]) -> usize {
        messages.iter().map(Self::estimate_message).sum()
    }
}

/// 历史预算：超过 trigger_tokens 时压缩，保留最近 keep_messages 条
#[derive(Debug, Clone, Copy)]
pub struct HistoryBudget {
    pub trigger_tokens: usize,
    pub keep_messages: usize,
}

impl HistoryBudget {
    pub fn new(trigger_tokens: usize, keep_messages: usize) -> Self {
        Self {
            trigger_tokens,
            keep_messages,
        }
    }

    pub fn exceeded(&self, messages: &[Message]) -> bool {
        TokenEstimator::estimate_messages(messages) > self.trigger_tokens
    }

    /// 计算压缩切分点：[..split] 进入摘要，[split..] 原样保留。
    ///
    /// 保留段不能以 ActionResult 开头（否则其对应的动作请求会被摘要掉），
    /// 因此切分点向前移动到非 ActionResult 消息处。无需压缩时返回 None。
    pub fn split_point(&self, messages: &[Message]) -> Option<usize> {
        if !self.exceeded(messages) || messages.len() <= self.keep_messages {
            return None;
        }
        let mut split = messages.len() - self.keep_messages;
        while split > 0 && messages[split].role == Role::ActionResult {
            split -= 1;
        }
        (split > 0).then_some(split)
    }
}

impl Default for HistoryBudget {
    fn default() -> Self {
        Self::new(8000, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ActionRequest, ActionResult};
    use serde_json::json;

    #[test]
    fn test_token_estimator_english() {
        let text = "Hello, world! This is a test.";
        let tokens = TokenEstimator::estimate(text);
        assert!(tokens > 0);
        assert!(tokens < text.len()); // 应该少于字符数
    }

    #[test]
    fn test_token_estimator_chinese() {
        let text = "你好世界，这是一个测试。";
        let tokens = TokenEstimator::estimate(text);
        assert_eq!(tokens, 8);
    }

    #[test]
    fn test_budget_not_exceeded() {
        let budget = HistoryBudget::new(1000, 10);
        let messages = vec![Message::human("short"), Message::assistant("reply")];
        assert!(!budget.exceeded(&messages));
        assert!(budget.split_point(&messages).is_none());
    }

    #[test]
    fn test_split_keeps_last_messages() {
        let budget = HistoryBudget::new(10, 2);
        let messages: Vec<Message> = (0..6)
            .map(|i| Message::human(format!("message number {i} with some padding text")))
            .collect();
        assert_eq!(budget.split_point(&messages), Some(4));
    }

    #[test]
    fn test_split_never_orphans_action_result() {
        let budget = HistoryBudget::new(10, 2);
        let req = ActionRequest::new("search_confluence", json!({"request": "guide"}));
        let messages = vec![
            Message::human("find the deployment guide please, it is somewhere"),
            Message::assistant("let me look that up in the documentation space"),
            Message::assistant_with_actions("", vec![req.clone()]),
            Message::action_result(ActionResult::success(&req, "Guide found at page X")),
            Message::assistant("Guide found at page X"),
        ];
        // 原始切分点 3 指向 ActionResult，应前移到 2（动作请求一起保留）
        assert_eq!(budget.split_point(&messages), Some(2));
    }
}
