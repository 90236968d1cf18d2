//! SupervisorSystem：生命周期与入口
//!
//! initialize() 幂等：推理后端与两个能力服务器连接每个进程只构建一次并缓存。
//! 完整的图（Supervisor + Workers + 审批闸门 + 重试包装）依赖能力服务器的实时动作列表，首次使用时才构建并缓存。
//! run / resume 先 initialize 再取图；每轮持有线程锁，在线程草稿上执行并受单轮超时约束，成功才提交，
//! 失败或超时时线程保持本轮开始前的状态。resume 例外：审批后执行的动作结果先行提交，只回滚其后的推理。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::error::Elapsed;
use tokio::time::Instant;

use crate::agent::{
    DelegationTool, Prompts, Supervisor, WorkerAgent, DOCUMENT_WORKER, NOTES_WORKER,
    SUPERVISOR_AGENT,
};
use crate::capability::{remote_registry, CapabilityServer, McpHttpClient};
use crate::config::{AppConfig, CapabilitySection, LlmSection};
use crate::core::{AgentError, ApprovalGate, TurnOutcome};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, RetryingLlmClient};
use crate::memory::{ActionResult, HistoryBudget, Message};
use crate::react::Planner;
use crate::session::{ConversationStore, ConversationThread, MemoryConversationStore};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 进程级共享组件
#[derive(Clone)]
pub struct Components {
    pub llm: Arc<dyn LlmClient>,
    pub documents: Arc<dyn CapabilityServer>,
    pub notes: Arc<dyn CapabilityServer>,
}

/// 组件构造：默认实现连接真实后端，测试可替换为桩
#[async_trait]
pub trait ComponentFactory: Send + Sync {
    async fn create_llm(&self, cfg: &LlmSection) -> Result<Arc<dyn LlmClient>, AgentError>;

    async fn connect_capability(
        &self,
        name: &str,
        cfg: &CapabilitySection,
    ) -> Result<Arc<dyn CapabilityServer>, AgentError>;
}

/// OpenAI 兼容后端（无 Key 时退回 Mock）+ MCP over HTTP
#[derive(Debug, Default)]
pub struct DefaultFactory;

#[async_trait]
impl ComponentFactory for DefaultFactory {
    async fn create_llm(&self, cfg: &LlmSection) -> Result<Arc<dyn LlmClient>, AgentError> {
        Ok(create_llm_from_config(cfg))
    }

    async fn connect_capability(
        &self,
        name: &str,
        cfg: &CapabilitySection,
    ) -> Result<Arc<dyn CapabilityServer>, AgentError> {
        let client = McpHttpClient::connect(name, &cfg.url, cfg.timeout_secs).await?;
        Ok(Arc::new(client))
    }
}

/// 根据配置创建 LLM 客户端：provider = mock 或没有 API Key 时使用 Mock
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = cfg.provider.to_lowercase();
    match cfg.resolved_api_key() {
        Some(key) if provider != "mock" => {
            let base = cfg.resolved_base_url();
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.model);
            Arc::new(
                OpenAiClient::new(base.as_deref(), &cfg.model, Some(&key))
                    .with_max_tokens(cfg.max_tokens)
                    .with_timeout(cfg.request_timeout_secs),
            )
        }
        _ => {
            tracing::warn!("No API key set or provider is mock, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 生命周期所有者：显式上下文对象，注入对话存储
pub struct SupervisorSystem {
    config: AppConfig,
    factory: Arc<dyn ComponentFactory>,
    store: Arc<dyn ConversationStore>,
    components: OnceCell<Components>,
    graph: OnceCell<Supervisor>,
}

impl SupervisorSystem {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            factory: Arc::new(DefaultFactory),
            store: Arc::new(MemoryConversationStore::new()),
            components: OnceCell::new(),
            graph: OnceCell::new(),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn ComponentFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ConversationStore> {
        self.store.clone()
    }

    /// 构建并缓存推理后端与能力服务器连接；成功后再次调用为空操作，失败则下次调用重试
    pub async fn initialize(&self) -> Result<&Components, AgentError> {
        self.components
            .get_or_try_init(|| async {
                tracing::info!("initializing supervisor system");
                let llm = self.factory.create_llm(&self.config.llm).await?;
                let documents = self
                    .factory
                    .connect_capability(DOCUMENT_WORKER, &self.config.capabilities.documents)
                    .await?;
                let notes = self
                    .factory
                    .connect_capability(NOTES_WORKER, &self.config.capabilities.notes)
                    .await?;
                Ok::<_, AgentError>(Components {
                    llm,
                    documents,
                    notes,
                })
            })
            .await
    }

    /// 取（必要时构建）缓存的图
    pub async fn graph(&self) -> Result<&Supervisor, AgentError> {
        let components = self.initialize().await?;
        self.graph
            .get_or_try_init(|| self.build_graph(components))
            .await
    }

    async fn build_graph(&self, components: &Components) -> Result<Supervisor, AgentError> {
        let cfg = &self.config;
        let prompts = Prompts::load(&cfg.prompts.dir);
        let reasoner: Arc<dyn LlmClient> = Arc::new(
            RetryingLlmClient::new(components.llm.clone(), cfg.llm.temperature)
                .with_policy(cfg.llm.parse_retry.policy())
                .with_recovery(cfg.llm.parse_retry.recovery()),
        );
        let backoff = cfg.tools.retry.policy();
        let timeout_secs = cfg.tools.tool_timeout_secs;

        let documents = WorkerAgent::new(
            Planner::new(DOCUMENT_WORKER, reasoner.clone(), prompts.documents),
            ToolExecutor::new(remote_registry(components.documents.clone()).await?, timeout_secs)
                .with_backoff(backoff),
            cfg.supervisor.worker_recursion_limit,
        );
        let notes = WorkerAgent::new(
            Planner::new(NOTES_WORKER, reasoner.clone(), prompts.notes),
            ToolExecutor::new(remote_registry(components.notes.clone()).await?, timeout_secs)
                .with_backoff(backoff),
            cfg.supervisor.worker_recursion_limit,
        );

        let mut delegation = ToolRegistry::new();
        delegation.register(DelegationTool::search_confluence(Arc::new(documents)));
        delegation.register(DelegationTool::manage_obsidian_notes(Arc::new(notes)));

        let supervisor = Supervisor::new(
            Planner::new(SUPERVISOR_AGENT, reasoner, prompts.supervisor),
            ToolExecutor::new(delegation, timeout_secs).with_backoff(backoff),
            ApprovalGate::new(
                cfg.supervisor.enable_human_approval,
                cfg.supervisor.read_only_actions.iter().cloned(),
            ),
            HistoryBudget::new(
                cfg.supervisor.summarization_trigger_tokens,
                cfg.supervisor.keep_messages,
            ),
            cfg.supervisor.max_recursion_limit,
        );
        tracing::info!(
            actions = ?supervisor.action_names(),
            approval = cfg.supervisor.enable_human_approval,
            "supervisor graph built"
        );
        Ok(supervisor)
    }

    /// 一轮用户输入
    pub async fn run(&self, text: &str, thread_id: &str) -> Result<TurnOutcome, AgentError> {
        let supervisor = self.graph().await?;
        let thread = self.store.get_or_create(thread_id).await;
        let mut guard = thread.lock().await;
        if guard.is_awaiting_decision() {
            return Err(AgentError::ApprovalPending(thread_id.to_string()));
        }

        tracing::info!(thread = %thread_id, "turn started");
        let mut draft = guard.clone();
        let result = tokio::time::timeout(self.turn_timeout(), supervisor.run_turn(&mut draft, text)).await;
        self.settle(&mut guard, draft, result)
    }

    /// 对线程上挂起的动作作出决定
    ///
    /// 两段提交：动作按决定执行后，结果与清除的挂起点立即写回线程；之后的推理步骤在草稿上进行，
    /// 失败时只回滚这一段，已执行的动作不会因再次 resume 而重复执行。
    pub async fn resume(&self, thread_id: &str, approved: bool) -> Result<TurnOutcome, AgentError> {
        let supervisor = self.graph().await?;
        let thread = self
            .store
            .get(thread_id)
            .await
            .ok_or_else(|| AgentError::NoPendingApproval(thread_id.to_string()))?;
        let mut guard = thread.lock().await;
        if !guard.is_awaiting_decision() {
            return Err(AgentError::NoPendingApproval(thread_id.to_string()));
        }

        tracing::info!(thread = %thread_id, approved, "resume");
        let deadline = Instant::now() + self.turn_timeout();
        let mut decided = guard.clone();
        match tokio::time::timeout_at(deadline, supervisor.decide(&mut decided, approved)).await {
            Ok(Ok(())) => {
                *guard = decided;
                tracing::debug!(thread = %thread_id, "decision committed");
            }
            Ok(Err(e)) => return self.failed(&guard, e),
            Err(_) => {
                abandon_pending(&mut guard);
                return self.failed(&guard, self.timeout_error());
            }
        }

        let mut draft = guard.clone();
        let result = tokio::time::timeout_at(deadline, supervisor.continue_turn(&mut draft)).await;
        self.settle(&mut guard, draft, result)
    }

    fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.config.supervisor.turn_timeout_secs)
    }

    fn timeout_error(&self) -> AgentError {
        AgentError::TurnTimeout(self.config.supervisor.turn_timeout_secs)
    }

    /// 成功则提交草稿；否则线程保持原状
    fn settle(
        &self,
        thread: &mut ConversationThread,
        draft: ConversationThread,
        result: Result<Result<TurnOutcome, AgentError>, Elapsed>,
    ) -> Result<TurnOutcome, AgentError> {
        match result {
            Ok(Ok(outcome)) => {
                *thread = draft;
                tracing::info!(thread = %thread.id(), state = ?outcome.gate_state(), "turn finished");
                Ok(outcome)
            }
            Ok(Err(e)) => self.failed(thread, e),
            Err(_) => self.failed(thread, self.timeout_error()),
        }
    }

    /// 协议误用直接上抛；轮内失败转为 Error 结果
    fn failed(
        &self,
        thread: &ConversationThread,
        err: AgentError,
    ) -> Result<TurnOutcome, AgentError> {
        match err {
            AgentError::NoPendingApproval(_) | AgentError::ApprovalPending(_) => Err(err),
            e => {
                tracing::error!(thread = %thread.id(), "turn failed: {}", e);
                Ok(TurnOutcome::from_error(&e))
            }
        }
    }
}

/// 决定阶段超时：动作可能已部分执行，清除挂起点并为每个动作记下结果未知，避免重复执行
fn abandon_pending(thread: &mut ConversationThread) {
    if let Some(suspension) = thread.take_suspension() {
        tracing::warn!(thread = %thread.id(), count = suspension.actions.len(), "pending actions abandoned on timeout");
        thread.extend(suspension.actions.iter().map(|a| {
            Message::action_result(ActionResult::failure(
                a,
                "the turn timed out before this action finished; its outcome is unknown",
            ))
        }));
    }
}
