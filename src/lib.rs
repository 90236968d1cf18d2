//! Hive - Rust 多智能体监督系统
//!
//! 模块划分：
//! - **agent**: Supervisor、委派动作、Worker 与系统提示词
//! - **capability**: 能力服务器契约与 MCP over HTTP 客户端
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、重试策略、审批闸门、单轮结果、SupervisorSystem 生命周期
//! - **llm**: 推理后端抽象与实现（OpenAI 兼容 / Mock）及温度扰动重试
//! - **memory**: 消息模型、token 估算与历史压缩预算
//! - **observability**: 日志初始化
//! - **react**: Planner 与推理+动作主循环
//! - **session**: 对话线程与对话存储
//! - **tools**: Tool trait、注册表与执行器

pub mod agent;
pub mod capability;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod session;
pub mod tools;

pub use crate::core::{AgentError, SupervisorSystem, TurnOutcome};
