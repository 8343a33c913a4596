//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，不持有会话状态。

pub mod json_extract;
pub mod ledger;
pub mod llm_service;
pub mod question_generator;
pub mod question_store;
pub mod script;
pub mod submission_sink;
pub mod validation;

pub use json_extract::extract_json;
pub use llm_service::LlmService;
pub use question_generator::{GenerationOutcome, QuestionGenerator};
pub use question_store::QuestionStore;
pub use script::{script_conformance, script_stats, ScriptStats, DEFAULT_SCRIPT_THRESHOLD};
pub use submission_sink::{SubmissionSink, UploadReceipt};
pub use validation::{validate_contribution, ValidationRules};
