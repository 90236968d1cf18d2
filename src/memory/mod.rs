//! 记忆层：对话消息模型、token 估算与历史压缩预算

pub mod conversation;
pub mod token_budget;

pub use conversation::{first_human_message, ActionRequest, ActionResult, Message, Role};
pub use token_budget::{HistoryBudget, TokenEstimator};
