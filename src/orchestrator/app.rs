//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：根据配置创建文档库、数据集仓库、LLM 客户端
//! 2. **组装能力**：抽题服务、生成服务、上传服务、贡献流程、管理后台
//! 3. **命令分发**：每个命令对应一次交互
//!
//! 资源只在这里创建，下层通过 `Arc` 共享。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{error, info};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{DocumentStore, FirestoreStore, HubDatasetStore, ObjectStore, TextGenerator};
use crate::models::{ContributionDraft, InputMode, Language, Script};
use crate::orchestrator::admin::AdminConsole;
use crate::services::{LlmService, QuestionGenerator, QuestionStore, SubmissionSink, ValidationRules};
use crate::workflow::{ContributionFlow, SessionCtx};

/// 命令行子命令
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 随机抽取一道未停用的题目
    Draw {
        #[arg(long, default_value = "Santali")]
        language: Language,
    },
    /// 回答一道随机题目并上传
    Submit {
        #[arg(long, default_value = "Santali")]
        language: Language,
        #[arg(long, default_value = "native")]
        script: Script,
        #[arg(long, default_value = "text")]
        input_mode: InputMode,
        /// 贡献者名称，留空为匿名
        #[arg(long, default_value = "")]
        user: String,
        /// 文字答案
        #[arg(long)]
        text: Option<String>,
        /// WAV 录音文件
        #[arg(long)]
        audio: Option<PathBuf>,
        /// 图片文件
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// 批量生成题目（需要管理口令）
    Generate {
        #[arg(long)]
        language: Language,
        #[arg(long, default_value = "native")]
        script: Script,
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// 题目主题
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// 停用一道题目（需要管理口令）
    Retire {
        id: String,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// 显示审核规则
    Overview,
}

/// 应用主结构
pub struct App {
    config: Config,
    flow: ContributionFlow,
    admin: AdminConsole,
}

impl App {
    /// 使用线上后端初始化应用
    pub fn initialize(config: Config) -> Result<Self, AppError> {
        let documents: Arc<dyn DocumentStore> = Arc::new(FirestoreStore::new(&config)?);
        let objects: Arc<dyn ObjectStore> = Arc::new(HubDatasetStore::new(&config));
        let llm: Arc<dyn TextGenerator> = Arc::new(LlmService::new(&config));
        Ok(Self::with_backends(config, documents, objects, llm))
    }

    /// 使用指定的后端初始化应用
    pub fn with_backends(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        llm: Arc<dyn TextGenerator>,
    ) -> Self {
        let store = Arc::new(QuestionStore::new(documents, config.question_fetch_limit));
        let generator = Arc::new(QuestionGenerator::new(
            llm,
            config.generation_retry_budget,
            config.script_threshold,
        ));

        let flow = ContributionFlow::new(
            store.clone(),
            SubmissionSink::new(objects, &config),
            ValidationRules::from_config(&config),
        );
        let admin = AdminConsole::new(config.admin_password.clone(), generator, store);

        Self { config, flow, admin }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 执行一个命令
    ///
    /// 失败时向用户输出一行简短提示，完整错误写入日志后返回。
    pub async fn run(&self, command: Command) -> Result<()> {
        let result = self.execute(command).await;
        if let Err(e) = &result {
            error!("❌ {:#}", e);
            match e.downcast_ref::<AppError>() {
                Some(app_error) => eprintln!("{}", app_error.user_message()),
                None => eprintln!("{:#}", e),
            }
        }
        result
    }

    async fn execute(&self, command: Command) -> Result<()> {
        match command {
            Command::Draw { language } => {
                let mut ctx = SessionCtx::new("", language, Script::Native, InputMode::Text);
                match self.flow.ensure_question(&mut ctx).await {
                    Some(question) => println!("{}\t{}", question.id, question.text),
                    None => println!("No questions available for {} yet.", language),
                }
            }

            Command::Submit {
                language,
                script,
                input_mode,
                user,
                text,
                audio,
                image,
            } => {
                let mut ctx = SessionCtx::new(user, language, script, input_mode);
                match self.flow.ensure_question(&mut ctx).await {
                    Some(question) => println!("Question: {}", question.text),
                    None => println!("No questions available for {} yet.", language),
                }

                let mut draft = ContributionDraft {
                    answer_text: text,
                    ..Default::default()
                };
                if let Some(path) = audio {
                    draft = draft.with_audio(read_file(&path).await?);
                }
                if let Some(path) = image {
                    draft = draft.with_image(read_file(&path).await?);
                }

                let outcome = self.flow.submit(&mut ctx, draft).await?;
                println!("Submitted {}.", outcome.receipt.submission_id);
                if let Some(next) = outcome.next_question {
                    println!("Next question: {}", next.text);
                }
            }

            Command::Generate {
                language,
                script,
                count,
                topic,
                password,
            } => {
                let session = self.admin.unlock(&password).context("管理口令错误")?;
                let report = session
                    .generate_batch(language, script, count, topic.as_deref())
                    .await;
                println!(
                    "Stored {}/{} questions ({} fallbacks discarded, {} store failures).",
                    report.stored.len(),
                    report.requested,
                    report.fallbacks,
                    report.store_failures
                );
            }

            Command::Retire { id, password } => {
                let session = self.admin.unlock(&password).context("管理口令错误")?;
                session.retire(&id).await.map_err(AppError::from)?;
                println!("Retired {}.", id);
            }

            Command::Overview => {
                println!("{}", crate::orchestrator::admin::ReviewPolicy::standard());
            }
        }

        Ok(())
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("读取文件失败: {}", path.display()))?;
    info!("已读取 {} ({} 字节)", path.display(), bytes.len());
    Ok(bytes)
}
