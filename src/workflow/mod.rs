//! 流程层（Workflow）
//!
//! 定义"一次贡献"的完整处理流程，只依赖业务能力层。

pub mod contribution_flow;
pub mod session_ctx;

pub use contribution_flow::{ContributionFlow, SubmitOutcome};
pub use session_ctx::SessionCtx;
