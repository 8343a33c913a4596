//! 管理后台 - 编排层
//!
//! ## 职责
//!
//! - 口令校验（明文比较，仅作为简单的门禁）
//! - 批量生成题目并写入题库，使用 Semaphore 控制并发
//! - 停用题目
//! - 输出固定的审核规则
//!
//! 兜底题目不会写入题库，避免同一道题被重复写入。

use std::ops::RangeInclusive;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::models::{Language, Question, Script};
use crate::services::{QuestionGenerator, QuestionStore};
use crate::utils::logging;

/// 默认的生成并发数
pub const DEFAULT_GENERATION_CONCURRENCY: usize = 4;

/// 人工审核规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPolicy {
    /// 每批题目数量
    pub batch_size: usize,
    /// 每批随机抽查的数量
    pub samples_per_batch: RangeInclusive<usize>,
}

impl ReviewPolicy {
    pub fn standard() -> Self {
        Self {
            batch_size: 50,
            samples_per_batch: 5..=6,
        }
    }

    /// 给定题目总数需要审核的批数
    pub fn batches_for(&self, total: usize) -> usize {
        total.div_ceil(self.batch_size)
    }
}

impl std::fmt::Display for ReviewPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Questions are reviewed in batches of {}. From each batch, {}-{} questions are sampled at random and checked by a native speaker.",
            self.batch_size,
            self.samples_per_batch.start(),
            self.samples_per_batch.end()
        )
    }
}

/// 批量生成报告
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub requested: usize,
    /// 成功写入题库的题目
    pub stored: Vec<Question>,
    /// 重试耗尽、未写入的数量
    pub fallbacks: usize,
    /// 生成成功但写入失败的数量
    pub store_failures: usize,
}

enum TaskResult {
    Stored(Question),
    Fallback,
    StoreFailed,
}

/// 管理后台
pub struct AdminConsole {
    password: String,
    generator: Arc<QuestionGenerator>,
    store: Arc<QuestionStore>,
    concurrency: usize,
}

impl AdminConsole {
    pub fn new(password: impl Into<String>, generator: Arc<QuestionGenerator>, store: Arc<QuestionStore>) -> Self {
        Self {
            password: password.into(),
            generator,
            store,
            concurrency: DEFAULT_GENERATION_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 校验口令，成功返回管理会话
    ///
    /// 未配置口令时永远拒绝。
    pub fn unlock(&self, attempt: &str) -> Option<AdminSession<'_>> {
        if self.password.is_empty() || attempt != self.password {
            warn!("管理口令校验失败");
            return None;
        }
        Some(AdminSession { console: self })
    }
}

/// 已通过口令校验的管理会话
pub struct AdminSession<'a> {
    console: &'a AdminConsole,
}

impl AdminSession<'_> {
    /// 批量生成题目并写入题库
    pub async fn generate_batch(
        &self,
        language: Language,
        script: Script,
        count: usize,
        topic: Option<&str>,
    ) -> BatchReport {
        logging::log_batch_start(language, count);

        let semaphore = Arc::new(Semaphore::new(self.console.concurrency));
        let topic = topic.map(str::to_string);
        let mut handles = Vec::with_capacity(count);

        for index in 1..=count {
            let semaphore = semaphore.clone();
            let generator = self.console.generator.clone();
            let store = self.console.store.clone();
            let topic = topic.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return TaskResult::StoreFailed;
                };

                let outcome = generator.generate(language, script, topic.as_deref()).await;
                if outcome.fallback {
                    return TaskResult::Fallback;
                }

                match store.seed(outcome.question.into_new_question(language)).await {
                    Ok(question) => {
                        logging::log_batch_progress(index, count, &question.text);
                        TaskResult::Stored(question)
                    }
                    Err(e) => {
                        error!("[{}/{}] ❌ 写入题库失败: {}", index, count, e);
                        TaskResult::StoreFailed
                    }
                }
            });
            handles.push((index, handle));
        }

        let mut report = BatchReport {
            requested: count,
            ..Default::default()
        };

        for (index, handle) in handles {
            match handle.await {
                Ok(TaskResult::Stored(question)) => report.stored.push(question),
                Ok(TaskResult::Fallback) => report.fallbacks += 1,
                Ok(TaskResult::StoreFailed) => report.store_failures += 1,
                Err(e) => {
                    error!("[{}/{}] 任务执行失败: {}", index, count, e);
                    report.store_failures += 1;
                }
            }
        }

        logging::log_batch_complete(language, report.stored.len(), report.fallbacks, count);
        report
    }

    /// 停用一道题目
    pub async fn retire(&self, id: &str) -> Result<(), StoreError> {
        self.console.store.retire(id).await?;
        info!("✓ 题目 {} 已停用", id);
        Ok(())
    }

    /// 审核规则
    pub fn overview(&self) -> ReviewPolicy {
        ReviewPolicy::standard()
    }
}
