//! 贡献流程 - 流程层
//!
//! 核心职责：定义"一次贡献"的完整处理流程
//!
//! 流程顺序：
//! 1. 校验内容（不发起任何网络请求）
//! 2. 上传二进制文件与元数据
//! 3. 抽取下一道题

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ContributionDraft, Language, Question, Submission};
use crate::services::{validate_contribution, QuestionStore, SubmissionSink, UploadReceipt, ValidationRules};
use crate::workflow::session_ctx::SessionCtx;

/// 一次成功提交的结果
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub receipt: UploadReceipt,
    /// 下一道题，题库为空时为 None
    pub next_question: Option<Question>,
}

/// 贡献流程
///
/// - 编排校验、上传、抽题
/// - 不持有会话状态，上下文由调用方传入
pub struct ContributionFlow {
    store: Arc<QuestionStore>,
    sink: SubmissionSink,
    rules: ValidationRules,
}

impl ContributionFlow {
    pub fn new(store: Arc<QuestionStore>, sink: SubmissionSink, rules: ValidationRules) -> Self {
        Self { store, sink, rules }
    }

    /// 确保上下文里有一道题
    pub async fn ensure_question(&self, ctx: &mut SessionCtx) -> Option<Question> {
        if ctx.current_question.is_none() {
            ctx.current_question = self.store.draw(ctx.language).await;
        }
        ctx.current_question.clone()
    }

    /// 切换语言并重新抽题
    pub async fn switch_language(&self, ctx: &mut SessionCtx, language: Language) -> Option<Question> {
        ctx.language = language;
        ctx.current_question = self.store.draw(language).await;
        if ctx.current_question.is_none() {
            info!("{} {} 暂无可用题目", ctx, language);
        }
        ctx.current_question.clone()
    }

    /// 提交一次贡献
    ///
    /// 校验失败时不会产生任何写入；上传失败时保留当前题目，方便重试。
    pub async fn submit(&self, ctx: &mut SessionCtx, draft: ContributionDraft) -> AppResult<SubmitOutcome> {
        validate_contribution(&draft, ctx.language, ctx.script, &self.rules)?;

        let submission = Submission {
            id: Uuid::new_v4(),
            user: ctx.user.clone(),
            language: ctx.language,
            script: ctx.script,
            input_mode: ctx.input_mode,
            question: ctx.question_text().to_string(),
            answer_text: draft.trimmed_text().map(str::to_string),
            has_audio: draft.has_audio(),
            has_image: draft.has_image(),
            timestamp: Utc::now(),
        };

        info!("{} 📤 正在上传提交 {}", ctx, submission.id);
        let receipt = match self
            .sink
            .upload(&submission, draft.audio.as_deref(), draft.image.as_deref())
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("{} ❌ 上传失败: {}", ctx, e);
                return Err(e.into());
            }
        };

        ctx.last_submission = Some(receipt.submission_id);
        ctx.current_question = self.store.draw(ctx.language).await;

        Ok(SubmitOutcome {
            receipt,
            next_question: ctx.current_question.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SinkLayout};
    use crate::error::{AppError, ValidationError};
    use crate::infrastructure::{MemoryDocumentStore, MemoryObjectStore};
    use crate::models::{InputMode, Script};

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            language: Language::Hindi,
            topic: "food".to_string(),
            text: "आपको क्या खाना पसंद है?".to_string(),
            used: false,
            timestamp: None,
        }
    }

    fn flow(objects: Arc<MemoryObjectStore>, questions: Vec<Question>) -> ContributionFlow {
        let config = Config {
            sink_layout: SinkLayout::Raw,
            ..Config::default()
        };
        let store = Arc::new(QuestionStore::new(
            Arc::new(MemoryDocumentStore::with_questions(questions)),
            config.question_fetch_limit,
        ));
        ContributionFlow::new(
            store,
            SubmissionSink::new(objects, &config),
            ValidationRules::from_config(&config),
        )
    }

    #[tokio::test]
    async fn test_invalid_submission_writes_nothing() {
        let objects = Arc::new(MemoryObjectStore::new());
        let flow = flow(objects.clone(), vec![question("h1")]);
        let mut ctx = SessionCtx::new("", Language::Hindi, Script::Native, InputMode::Text);
        flow.ensure_question(&mut ctx).await;

        let result = flow.submit(&mut ctx, ContributionDraft::text("I like rice")).await;

        assert!(matches!(
            result,
            Err(AppError::Validation(ValidationError::ScriptMismatch { .. }))
        ));
        assert!(objects.writes().is_empty());
        assert_eq!(ctx.last_submission, None);
    }

    #[tokio::test]
    async fn test_submit_records_question_and_draws_next() {
        let objects = Arc::new(MemoryObjectStore::new());
        let flow = flow(objects.clone(), vec![question("h1")]);
        let mut ctx = SessionCtx::new("asha", Language::Hindi, Script::Native, InputMode::Text);
        assert!(flow.ensure_question(&mut ctx).await.is_some());

        let outcome = flow
            .submit(&mut ctx, ContributionDraft::text(" दाल चावल "))
            .await
            .unwrap();

        assert_eq!(ctx.last_submission, Some(outcome.receipt.submission_id));
        assert_eq!(outcome.next_question.map(|q| q.id), Some("h1".to_string()));

        let metadata_path = format!("raw/text/{}.json", outcome.receipt.submission_id);
        let stored: Submission = serde_json::from_slice(&objects.file(&metadata_path).unwrap()).unwrap();
        assert_eq!(stored.user, "asha");
        assert_eq!(stored.question, "आपको क्या खाना पसंद है?");
        assert_eq!(stored.answer_text.as_deref(), Some("दाल चावल"));
        assert!(!stored.has_audio);
    }

    #[tokio::test]
    async fn test_switch_language_to_empty_pool() {
        let flow = flow(Arc::new(MemoryObjectStore::new()), vec![question("h1")]);
        let mut ctx = SessionCtx::new("", Language::Hindi, Script::Native, InputMode::Text);
        flow.ensure_question(&mut ctx).await;

        assert_eq!(flow.switch_language(&mut ctx, Language::Santali).await, None);
        assert_eq!(ctx.language, Language::Santali);
        assert_eq!(ctx.current_question, None);
    }
}
