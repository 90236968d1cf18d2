//! 核心编排层：错误与恢复、重试策略、审批闸门、单轮结果、SupervisorSystem 生命周期

pub mod approval;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod state;

pub use approval::{ApprovalGate, GateDecision, GateState};
pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{
    create_llm_from_config, ComponentFactory, Components, DefaultFactory, SupervisorSystem,
};
pub use recovery::{RecoveryEngine, PARSING_ERROR_KEYWORDS};
pub use retry::{BackoffPolicy, PerturbationPolicy};
pub use state::TurnOutcome;
