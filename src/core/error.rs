//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据错误决定扰动重试（推理输出格式错误）、退避重试（动作瞬时失败）或直接上抛。

use thiserror::Error;

use crate::capability::CapabilityError;
use crate::llm::LlmError;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    /// 单次 run/resume 内推理步数超过上限
    #[error("Recursion limit of {0} steps reached without a final answer")]
    RecursionLimit(usize),

    /// resume 时线程没有待审批的动作
    #[error("No pending approval for thread '{0}'")]
    NoPendingApproval(String),

    /// 线程已挂起等待审批，不能开始新的 run
    #[error("Thread '{0}' is awaiting an approval decision")]
    ApprovalPending(String),

    #[error("Capability server error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Turn timed out after {0}s")]
    TurnTimeout(u64),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 提高采样温度后重试一次（推理后端结构化输出解析失败）
    RetryWithPerturbation,
    /// 指数退避后重试（动作执行瞬时失败）
    RetryWithBackoff,
    /// 不重试，直接上抛
    Abort,
}
