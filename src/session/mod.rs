//! 会话层：对话线程与按 thread_id 索引的对话存储

pub mod store;
pub mod thread;

pub use store::{ConversationStore, MemoryConversationStore, SharedThread};
pub use thread::{ConversationThread, Suspension};
