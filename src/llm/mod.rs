//! LLM 层：推理后端抽象与实现（OpenAI 兼容 / Mock）及温度扰动重试包装

pub mod mock;
pub mod openai;
pub mod retrying;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use retrying::RetryingLlmClient;
pub use traits::{ActionSpec, LlmClient, LlmError, LlmRequest, LlmResponse};
