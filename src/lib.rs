//! # JanAI Collect
//!
//! 面向少数民族语言（桑塔利语、印地语、孟加拉语、奥里亚语）的众包数据采集工具
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源（HTTP 客户端、凭证），只暴露读写能力
//! - `FirestoreStore` - 题库文档集合
//! - `HubDatasetStore` - Hugging Face 数据集仓库，带版本前置条件的写入
//! - `MemoryDocumentStore` / `MemoryObjectStore` - 内存实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `QuestionStore` - 抽题能力
//! - `QuestionGenerator` - 出题能力（重试 + 兜底）
//! - `SubmissionSink` - 上传能力（文件 → 元数据 → 账本）
//! - `script` / `json_extract` / `validation` - 纯函数校验
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次贡献"的完整处理流程
//! - `SessionCtx` - 会话上下文（用户 + 语言 + 文字 + 输入方式 + 当前题目）
//! - `ContributionFlow` - 流程编排（校验 → 上传 → 抽下一题）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 创建资源、分发命令
//! - `orchestrator/admin` - 管理后台（批量出题、停用题目、审核规则）

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ContributionDraft, InputMode, Language, Question, Script, Submission};
pub use orchestrator::{App, Command};
pub use workflow::{ContributionFlow, SessionCtx};
