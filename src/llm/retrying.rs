//! 带温度扰动重试的 LLM 客户端
//!
//! 首次调用使用基础温度；若失败被 RecoveryEngine 判定为结构化输出解析失败，则以 base + boost（上限 max_temperature）
//! 重试，至多 max_retries 次。温度只写在单次请求上，不修改共享状态，后续调用始终回到基础温度。
//! 其他错误（网络、鉴权等）立即上抛。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{PerturbationPolicy, RecoveryAction, RecoveryEngine};
use crate::llm::{LlmClient, LlmError, LlmRequest, LlmResponse};

pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    base_temperature: f32,
    policy: PerturbationPolicy,
    recovery: RecoveryEngine,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, base_temperature: f32) -> Self {
        Self {
            inner,
            base_temperature,
            policy: PerturbationPolicy::default(),
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn with_policy(mut self, policy: PerturbationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryEngine) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn base_temperature(&self) -> f32 {
        self.base_temperature
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let base = request.temperature.unwrap_or(self.base_temperature);
        let mut attempt: u32 = 0;
        let mut current = request.with_temperature(base);

        loop {
            match self.inner.complete(&current).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let perturb = attempt < self.policy.max_retries
                        && self.recovery.handle_llm(&e) == RecoveryAction::RetryWithPerturbation;
                    if !perturb {
                        if attempt > 0 {
                            tracing::error!(agent = %request.agent, attempt, "LLM retry failed: {}", e);
                        }
                        return Err(e);
                    }
                    attempt += 1;
                    let temperature = self.policy.perturbed(base);
                    tracing::warn!(
                        agent = %request.agent,
                        attempt,
                        temperature,
                        "Parsing error detected, retrying with higher temperature: {}",
                        e
                    );
                    current = request.with_temperature(temperature);
                }
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
