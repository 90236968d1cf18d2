//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），使用 function calling：
//! 动作 schema 转为 tools，响应中的 tool_calls 转为 ActionRequest。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{ActionSpec, LlmClient, LlmError, LlmRequest, LlmResponse};
use crate::memory::{ActionRequest, Message, Role};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: Option<u32>,
    timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            max_tokens: None,
            timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout = Duration::from_secs(timeout_secs);
        self
    }

    fn to_openai_messages(
        &self,
        request: &LlmRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut out = Vec::with_capacity(request.messages.len() + 1);
        out.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.clone())
                .build()?
                .into(),
        );

        for m in &request.messages {
            let msg: ChatCompletionRequestMessage = match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()?
                    .into(),
                Role::Human => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()?
                    .into(),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() {
                        args.content(m.content.clone());
                    }
                    if !m.action_requests.is_empty() {
                        args.tool_calls(m.action_requests.iter().map(to_tool_call).collect::<Vec<_>>());
                    }
                    args.build()?.into()
                }
                Role::ActionResult => {
                    let call_id = m
                        .action_result
                        .as_ref()
                        .map(|r| r.action_id.clone())
                        .unwrap_or_default();
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.clone())
                        .tool_call_id(call_id)
                        .build()?
                        .into()
                }
            };
            out.push(msg);
        }
        Ok(out)
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let messages = self.to_openai_messages(request).map_err(map_openai_error)?;
        let tools = request
            .actions
            .iter()
            .map(to_tool)
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_openai_error)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&self.model).messages(messages);
        if !tools.is_empty() {
            builder.tools(tools);
        }
        if let Some(t) = request.temperature {
            builder.temperature(t);
        }
        if let Some(max) = self.max_tokens {
            builder.max_tokens(max);
        }
        let api_request = builder.build().map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedOutput("response contained no choices".to_string()))?;
        let content = choice.message.content.unwrap_or_default();

        match choice.message.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let requests = calls
                    .into_iter()
                    .map(from_tool_call)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LlmResponse::Actions { content, requests })
            }
            _ => Ok(LlmResponse::Text(content)),
        }
    }
}

fn to_tool(spec: &ActionSpec) -> Result<ChatCompletionTool, OpenAIError> {
    ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(
            FunctionObjectArgs::default()
                .name(spec.name.clone())
                .description(spec.description.clone())
                .parameters(spec.parameters.clone())
                .build()?,
        )
        .build()
}

fn to_tool_call(request: &ActionRequest) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: request.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: request.name.clone(),
            arguments: request.args.to_string(),
        },
    }
}

/// tool_call.arguments 必须是 JSON 对象（空字符串视为 {}）
fn from_tool_call(call: ChatCompletionMessageToolCall) -> Result<ActionRequest, LlmError> {
    let raw = call.function.arguments.trim();
    let args: Value = if raw.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(raw).map_err(|e| {
            LlmError::MalformedOutput(format!(
                "tool call '{}' arguments are not valid JSON: {}",
                call.function.name, e
            ))
        })?
    };
    if !args.is_object() {
        return Err(LlmError::MalformedOutput(format!(
            "tool call '{}' arguments must be a JSON object",
            call.function.name
        )));
    }
    Ok(ActionRequest::with_id(call.function.name, args, call.id))
}

fn map_openai_error(e: OpenAIError) -> LlmError {
    match e {
        OpenAIError::Reqwest(e) => LlmError::Network(e.to_string()),
        OpenAIError::ApiError(api) => LlmError::ApiError(api.message),
        OpenAIError::JSONDeserialize(e) => LlmError::MalformedOutput(e.to_string()),
        other => LlmError::ApiError(other.to_string()),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        tokio::time::timeout(self.timeout, self.send(request))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout.as_secs()))?
    }
}
