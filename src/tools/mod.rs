//! 工具层：Tool trait、按名查找的注册表、带超时与退避重试的执行器

#[cfg(test)]
pub mod echo;
pub mod executor;
pub mod registry;

#[cfg(test)]
pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolContext, ToolRegistry};
