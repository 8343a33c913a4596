//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责创建资源和分发命令，是整个系统的"指挥中心"。
//!
//! ### `app` - 应用入口
//! - 根据配置创建后端（Firestore / Hub / LLM）
//! - 组装服务和流程
//! - 分发命令行子命令
//!
//! ### `admin` - 管理后台
//! - 口令校验
//! - 批量生成题目（Semaphore 控制并发）
//! - 停用题目、输出审核规则
//!
//! ## 层次关系
//!
//! ```text
//! app / admin
//!     ↓
//! workflow::ContributionFlow (处理一次贡献)
//!     ↓
//! services (能力层：抽题 / 生成 / 校验 / 上传)
//!     ↓
//! infrastructure (基础设施：DocumentStore / ObjectStore / TextGenerator)
//! ```

pub mod admin;
pub mod app;

pub use admin::{AdminConsole, AdminSession, BatchReport, ReviewPolicy};
pub use app::{App, Command};
