//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__SUPERVISOR__ENABLE_HUMAN_APPROVAL=false`）。
//! 推理后端的 Key 与地址另外兼容 `OPENAI_API_KEY` / `OPENAI_API_BASE`。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{BackoffPolicy, PerturbationPolicy, RecoveryEngine, PARSING_ERROR_KEYWORDS};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub capabilities: CapabilitiesSection,
    pub supervisor: SupervisorSection,
    pub tools: ToolsSection,
    pub prompts: PromptsSection,
}

/// [llm] 段：模型、地址、温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai（任意 OpenAI 兼容服务）/ mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// 基础采样温度
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: u64,
    pub parse_retry: ParseRetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4.1".to_string(),
            base_url: None,
            api_key: None,
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: 60,
            parse_retry: ParseRetrySection::default(),
        }
    }
}

impl LlmSection {
    /// 配置中的 Key 优先，其次 OPENAI_API_KEY；空字符串视为未设置
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn resolved_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| std::env::var("OPENAI_API_BASE").ok())
            .filter(|u| !u.trim().is_empty())
    }
}

/// [llm.parse_retry] 段：结构化输出解析失败时的温度扰动重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParseRetrySection {
    pub max_retries: u32,
    pub temperature_boost: f32,
    pub max_temperature: f32,
    /// 错误字符串中出现任一关键字即视为解析类失败
    pub keywords: Vec<String>,
}

impl Default for ParseRetrySection {
    fn default() -> Self {
        Self {
            max_retries: 1,
            temperature_boost: 0.3,
            max_temperature: 1.0,
            keywords: PARSING_ERROR_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ParseRetrySection {
    pub fn policy(&self) -> PerturbationPolicy {
        PerturbationPolicy {
            max_retries: self.max_retries,
            temperature_boost: self.temperature_boost,
            max_temperature: self.max_temperature,
        }
    }

    pub fn recovery(&self) -> RecoveryEngine {
        RecoveryEngine::with_keywords(self.keywords.iter().cloned())
    }
}

/// [capabilities] 段：两个能力服务器
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilitiesSection {
    /// 文档检索（Confluence）
    pub documents: CapabilitySection,
    /// 笔记管理（Obsidian）
    pub notes: CapabilitySection,
}

impl Default for CapabilitiesSection {
    fn default() -> Self {
        Self {
            documents: CapabilitySection::with_url("http://localhost:8001/mcp"),
            notes: CapabilitySection::with_url("http://localhost:8002/mcp"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilitySection {
    pub url: String,
    /// 单次 HTTP 请求超时（秒）
    pub timeout_secs: u64,
}

impl CapabilitySection {
    fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for CapabilitySection {
    fn default() -> Self {
        Self::with_url("http://localhost:8000/mcp")
    }
}

/// [supervisor] 段：审批、步数上限、历史压缩、单轮超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorSection {
    pub enable_human_approval: bool,
    pub max_recursion_limit: usize,
    pub worker_recursion_limit: usize,
    pub summarization_trigger_tokens: usize,
    pub keep_messages: usize,
    pub turn_timeout_secs: u64,
    /// 无需审批的动作名
    pub read_only_actions: Vec<String>,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            enable_human_approval: true,
            max_recursion_limit: 25,
            worker_recursion_limit: 15,
            summarization_trigger_tokens: 8000,
            keep_messages: 10,
            turn_timeout_secs: 300,
            read_only_actions: Vec::new(),
        }
    }
}

/// [tools] 段：单次动作超时与退避重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub retry: RetrySection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 120,
            retry: RetrySection::default(),
        }
    }
}

/// [tools.retry] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            self.backoff_factor,
        )
        .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

/// [prompts] 段：系统提示词目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    pub dir: PathBuf,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config/prompts"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
