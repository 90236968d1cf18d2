//! 认知层：Planner（单步推理）与推理+动作主循环

pub mod loop_;
pub mod planner;

pub use loop_::{compact_context, execute_actions, react_loop, LoopExit, ReactSession};
pub use planner::Planner;
