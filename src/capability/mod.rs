//! 能力服务器层
//!
//! 每个 Worker 背后是一个外部能力服务器：启动时发现动作列表（名称、参数 schema、说明），
//! 调用时发送 {name, arguments} 并取回文本结果。McpHttpClient 为基于 HTTP 的 JSON-RPC 实现，
//! RemoteTool 把远端动作包装为本地 Tool 注册进 Worker 的 ToolRegistry。

pub mod client;
pub mod tool;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::ActionSpec;

pub use client::McpHttpClient;
pub use tool::{remote_registry, RemoteTool};

/// 能力服务器错误
#[derive(Error, Debug, Clone)]
pub enum CapabilityError {
    #[error("Connection to '{server}' failed: {message}")]
    Connection { server: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Action '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },
}

/// 能力服务器契约：发现动作、按名调用
#[async_trait]
pub trait CapabilityServer: Send + Sync {
    fn name(&self) -> &str;

    async fn list_actions(&self) -> Result<Vec<ActionSpec>, CapabilityError>;

    async fn invoke(&self, action: &str, args: Value) -> Result<String, CapabilityError>;
}
