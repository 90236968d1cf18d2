//! 智能体层：Supervisor、委派动作、Worker 与系统提示词

pub mod delegation;
pub mod prompts;
pub mod supervisor;
pub mod worker;

pub use delegation::{compose_task, DelegationArgs, DelegationTool, MANAGE_OBSIDIAN_NOTES, SEARCH_CONFLUENCE};
pub use prompts::Prompts;
pub use supervisor::{Supervisor, SUPERVISOR_AGENT};
pub use worker::{Worker, WorkerAgent, DOCUMENT_WORKER, NOTES_WORKER};
