//! 对话存储抽象层
//!
//! 以 thread_id 为键的进程内存储。每个线程包在独立的异步互斥锁中，一轮 run/resume 期间持有该锁，
//! 不同线程的轮次互不阻塞。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::thread::ConversationThread;

/// 可跨任务共享、按线程加锁的对话
pub type SharedThread = Arc<Mutex<ConversationThread>>;

/// 对话存储接口
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 获取线程，不存在时创建
    async fn get_or_create(&self, thread_id: &str) -> SharedThread;

    /// 获取已有线程
    async fn get(&self, thread_id: &str) -> Option<SharedThread>;

    /// 丢弃线程，返回是否存在
    async fn reset(&self, thread_id: &str) -> bool;

    /// 线程数
    async fn len(&self) -> usize;
}

/// 内存对话存储
#[derive(Default)]
pub struct MemoryConversationStore {
    threads: RwLock<HashMap<String, SharedThread>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get_or_create(&self, thread_id: &str) -> SharedThread {
        if let Some(thread) = self.threads.read().await.get(thread_id) {
            return thread.clone();
        }
        let mut threads = self.threads.write().await;
        threads
            .entry(thread_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(thread = %thread_id, "new conversation thread");
                Arc::new(Mutex::new(ConversationThread::new(thread_id)))
            })
            .clone()
    }

    async fn get(&self, thread_id: &str) -> Option<SharedThread> {
        self.threads.read().await.get(thread_id).cloned()
    }

    async fn reset(&self, thread_id: &str) -> bool {
        self.threads.write().await.remove(thread_id).is_some()
    }

    async fn len(&self) -> usize {
        self.threads.read().await.len()
    }
}
