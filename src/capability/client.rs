//! MCP over HTTP 客户端
//!
//! JSON-RPC 2.0 通过 HTTP POST 发送；服务器可直接返回 JSON，也可返回单事件的 text/event-stream（取最后一行 data:）。
//! 握手：initialize（记录 Mcp-Session-Id）-> notifications/initialized；之后 tools/list（支持 nextCursor 分页）与 tools/call。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::capability::{CapabilityError, CapabilityServer};
use crate::llm::ActionSpec;

const PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// tools/list 中的单个动作
#[derive(Debug, Deserialize)]
struct RemoteAction {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListResult {
    #[serde(default)]
    tools: Vec<RemoteAction>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    #[serde(default)]
    content: Vec<Value>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

/// 基于 reqwest 的 MCP 客户端
pub struct McpHttpClient {
    name: String,
    url: String,
    http: reqwest::Client,
    session_id: RwLock<Option<String>>,
    next_id: AtomicU64,
}

impl McpHttpClient {
    /// 建立连接并完成握手
    pub async fn connect(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CapabilityError> {
        let name = name.into();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CapabilityError::Connection {
                server: name.clone(),
                message: e.to_string(),
            })?;
        let client = Self {
            name,
            url: url.into(),
            http,
            session_id: RwLock::new(None),
            next_id: AtomicU64::new(1),
        };
        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&self) -> Result<(), CapabilityError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "hive", "version": env!("CARGO_PKG_VERSION") }
        });
        let result = self.request("initialize", Some(params)).await?;
        let server = result
            .pointer("/serverInfo/name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        tracing::info!(capability = %self.name, server, url = %self.url, "capability server initialized");
        self.notify("notifications/initialized").await
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, CapabilityError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = self
            .post(&JsonRpcRequest {
                jsonrpc: "2.0",
                id: Some(id),
                method,
                params,
            })
            .await?;
        let response: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| CapabilityError::Protocol(format!("invalid {} response: {}", method, e)))?;
        if let Some(err) = response.error {
            return Err(CapabilityError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> Result<(), CapabilityError> {
        let sent = self
            .post(&JsonRpcRequest {
                jsonrpc: "2.0",
                id: None,
                method,
                params: None,
            })
            .await;
        // 通知没有响应体
        match sent {
            Ok(_) | Err(CapabilityError::Protocol(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// 发送一次 POST，返回 JSON 文本（已从 SSE 中解出）
    async fn post(&self, payload: &JsonRpcRequest<'_>) -> Result<String, CapabilityError> {
        let mut req = self
            .http
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(payload);
        if let Some(session) = self.session_id.read().await.as_ref() {
            req = req.header(SESSION_HEADER, session.as_str());
        }

        let resp = req.send().await.map_err(|e| CapabilityError::Connection {
            server: self.name.clone(),
            message: e.to_string(),
        })?;

        if let Some(session) = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.write().await = Some(session.to_string());
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(CapabilityError::Connection {
                server: self.name.clone(),
                message: format!("HTTP {}", status),
            });
        }

        let is_sse = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);
        let text = resp.text().await.map_err(|e| CapabilityError::Connection {
            server: self.name.clone(),
            message: e.to_string(),
        })?;

        if is_sse {
            parse_sse(&text).ok_or_else(|| {
                CapabilityError::Protocol("event stream carried no data".to_string())
            })
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl CapabilityServer for McpHttpClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_actions(&self) -> Result<Vec<ActionSpec>, CapabilityError> {
        let mut specs = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListResult = serde_json::from_value(result)
                .map_err(|e| CapabilityError::Protocol(format!("invalid tools/list result: {}", e)))?;
            specs.extend(page.tools.into_iter().map(to_action_spec));
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        tracing::debug!(capability = %self.name, count = specs.len(), "fetched action list");
        Ok(specs)
    }

    async fn invoke(&self, action: &str, args: Value) -> Result<String, CapabilityError> {
        let params = json!({ "name": action, "arguments": args });
        let result = self.request("tools/call", Some(params)).await?;
        let call: CallResult = serde_json::from_value(result)
            .map_err(|e| CapabilityError::Protocol(format!("invalid tools/call result: {}", e)))?;
        let text = join_text_content(&call.content);
        if call.is_error {
            return Err(CapabilityError::ToolFailed {
                tool: action.to_string(),
                message: text,
            });
        }
        Ok(text)
    }
}

fn to_action_spec(action: RemoteAction) -> ActionSpec {
    ActionSpec {
        name: action.name,
        description: action.description.unwrap_or_default(),
        parameters: action
            .input_schema
            .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
    }
}

/// 单事件 SSE：取最后一行 data:
fn parse_sse(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .filter(|data| !data.is_empty())
        .last()
}

/// 拼接所有 text 类型的内容块，其他类型忽略
fn join_text_content(content: &[Value]) -> String {
    content
        .iter()
        .filter(|c| c.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|c| c.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_last_data_wins() {
        let body = "event: message\ndata: {\"a\":1}\n\ndata: {\"a\":2}\n\n";
        assert_eq!(parse_sse(body).as_deref(), Some("{\"a\":2}"));
        assert_eq!(parse_sse("event: ping\n\n"), None);
    }

    #[test]
    fn test_join_text_content_skips_non_text() {
        let content = vec![
            json!({"type": "text", "text": "line 1"}),
            json!({"type": "image", "data": "...", "mimeType": "image/png"}),
            json!({"type": "text", "text": "line 2"}),
        ];
        assert_eq!(join_text_content(&content), "line 1\nline 2");
    }

    #[test]
    fn test_list_result_parsing() {
        let raw = json!({
            "tools": [
                {"name": "search", "description": "Search pages", "inputSchema": {"type": "object"}},
                {"name": "bare"}
            ],
            "nextCursor": "page-2"
        });
        let page: ListResult = serde_json::from_value(raw).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
        let specs: Vec<ActionSpec> = page.tools.into_iter().map(to_action_spec).collect();
        assert_eq!(specs[0].description, "Search pages");
        assert_eq!(specs[1].parameters["type"], "object");
    }

    #[test]
    fn test_call_result_error_flag() {
        let raw = json!({"content": [{"type": "text", "text": "note not found"}], "isError": true});
        let call: CallResult = serde_json::from_value(raw).unwrap();
        assert!(call.is_error);
        assert_eq!(join_text_content(&call.content), "note not found");
    }

    #[test]
    fn test_notification_has_no_id() {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method: "notifications/initialized",
            params: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("id").is_none());
        assert_eq!(v["method"], "notifications/initialized");
    }
}
