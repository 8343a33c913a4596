use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::infrastructure::ServiceAccountKey;

/// 提交内容的最低要求
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRequirement {
    /// 必须有文字，录音和图片可选
    TextRequired,
    /// 文字、录音、图片至少一项
    AnyContent,
}

impl FromStr for ContentRequirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text_required" => Ok(Self::TextRequired),
            "any_content" => Ok(Self::AnyContent),
            other => Err(format!("未知的提交要求: {}", other)),
        }
    }
}

/// 数据集仓库中的文件布局
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkLayout {
    /// `raw/<mode>/<id>.json` + `raw/audio/<id>.wav` + `raw/images/<id>.png`
    Raw,
    /// `data/<language>/<id>.json` + `audio/<language>/<id>.wav` + 账本 CSV
    Ledger,
}

impl FromStr for SinkLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "ledger" => Ok(Self::Ledger),
            other => Err(format!("未知的文件布局: {}", other)),
        }
    }
}

/// 程序配置
///
/// 加载顺序：默认值 → TOML 密钥文件 → 环境变量，最后校验必需的密钥。
/// TOML 中的键名与环境变量同名（大写下划线）。
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 题库（Firestore）配置 ---
    pub firestore_base_url: String,
    /// 为空时使用服务账号密钥中的 `project_id`
    pub firestore_project_id: String,
    /// 服务账号密钥 JSON
    pub firebase_key: String,
    pub questions_collection: String,
    /// 每次抽题最多取回的候选数
    pub question_fetch_limit: usize,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 生成题目的最大尝试次数
    pub generation_retry_budget: usize,
    // --- 数据集仓库配置 ---
    pub hf_endpoint: String,
    pub hf_token: String,
    pub hf_repo_id: String,
    pub hf_revision: String,
    pub sink_layout: SinkLayout,
    pub ledger_path: String,
    pub ledger_conflict_retries: usize,
    // --- 校验配置 ---
    pub content_requirement: ContentRequirement,
    /// 本族文字占比阈值
    pub script_threshold: f64,
    /// 本族文字答案的最少有效字符数
    pub min_countable_chars: usize,
    // --- 管理员 ---
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            firestore_base_url: "https://firestore.googleapis.com/v1".to_string(),
            firestore_project_id: String::new(),
            firebase_key: String::new(),
            questions_collection: "questions_pool".to_string(),
            question_fetch_limit: 20,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-1.5-flash".to_string(),
            generation_retry_budget: 3,
            hf_endpoint: "https://huggingface.co".to_string(),
            hf_token: String::new(),
            hf_repo_id: "JanAI-Workspace/Santali-dataset".to_string(),
            hf_revision: "main".to_string(),
            sink_layout: SinkLayout::Raw,
            ledger_path: "data.csv".to_string(),
            ledger_conflict_retries: 5,
            content_requirement: ContentRequirement::TextRequired,
            script_threshold: 0.8,
            min_countable_chars: 1,
            admin_password: String::new(),
        }
    }
}

impl Config {
    /// 加载并校验配置
    pub fn load(secrets_file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match secrets_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 密钥文件读取，缺失的键使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 使用进程环境变量覆盖
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// 使用任意键值来源覆盖（便于测试）
    pub fn with_overrides<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let c = self;
        Ok(Self {
            verbose_logging: parse_or("VERBOSE_LOGGING", c.verbose_logging, &lookup)?,
            firestore_base_url: lookup("FIRESTORE_BASE_URL").unwrap_or(c.firestore_base_url),
            firestore_project_id: lookup("FIRESTORE_PROJECT_ID").unwrap_or(c.firestore_project_id),
            firebase_key: lookup("FIREBASE_KEY").unwrap_or(c.firebase_key),
            questions_collection: lookup("QUESTIONS_COLLECTION").unwrap_or(c.questions_collection),
            question_fetch_limit: parse_or("QUESTION_FETCH_LIMIT", c.question_fetch_limit, &lookup)?,
            llm_api_key: lookup("LLM_API_KEY").unwrap_or(c.llm_api_key),
            llm_api_base_url: lookup("LLM_API_BASE_URL").unwrap_or(c.llm_api_base_url),
            llm_model_name: lookup("LLM_MODEL_NAME").unwrap_or(c.llm_model_name),
            generation_retry_budget: parse_or("GENERATION_RETRY_BUDGET", c.generation_retry_budget, &lookup)?,
            hf_endpoint: lookup("HF_ENDPOINT").unwrap_or(c.hf_endpoint),
            hf_token: lookup("HF_TOKEN").unwrap_or(c.hf_token),
            hf_repo_id: lookup("HF_REPO_ID").unwrap_or(c.hf_repo_id),
            hf_revision: lookup("HF_REVISION").unwrap_or(c.hf_revision),
            sink_layout: parse_or("SINK_LAYOUT", c.sink_layout, &lookup)?,
            ledger_path: lookup("LEDGER_PATH").unwrap_or(c.ledger_path),
            ledger_conflict_retries: parse_or("LEDGER_CONFLICT_RETRIES", c.ledger_conflict_retries, &lookup)?,
            content_requirement: parse_or("CONTENT_REQUIREMENT", c.content_requirement, &lookup)?,
            script_threshold: parse_or("SCRIPT_THRESHOLD", c.script_threshold, &lookup)?,
            min_countable_chars: parse_or("MIN_COUNTABLE_CHARS", c.min_countable_chars, &lookup)?,
            admin_password: lookup("ADMIN_PASSWORD").unwrap_or(c.admin_password),
        })
    }

    /// 校验必需的密钥和取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("FIREBASE_KEY", &self.firebase_key),
            ("LLM_API_KEY", &self.llm_api_key),
            ("HF_TOKEN", &self.hf_token),
            ("HF_REPO_ID", &self.hf_repo_id),
            ("ADMIN_PASSWORD", &self.admin_password),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingSecret {
                    key: key.to_string(),
                });
            }
        }

        let key = self.service_account()?;
        key.encoding_key().map_err(|e| ConfigError::InvalidValue {
            key: "FIREBASE_KEY".to_string(),
            reason: e.to_string(),
        })?;
        if self.firestore_project(&key).is_none() {
            return Err(ConfigError::MissingSecret {
                key: "FIRESTORE_PROJECT_ID".to_string(),
            });
        }

        if !(self.script_threshold > 0.0 && self.script_threshold <= 1.0) {
            return Err(ConfigError::InvalidValue {
                key: "SCRIPT_THRESHOLD".to_string(),
                reason: format!("{} 不在 (0, 1] 范围内", self.script_threshold),
            });
        }
        if self.question_fetch_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "QUESTION_FETCH_LIMIT".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if self.generation_retry_budget == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GENERATION_RETRY_BUDGET".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    /// 解析服务账号密钥
    pub fn service_account(&self) -> Result<ServiceAccountKey, ConfigError> {
        ServiceAccountKey::from_json(&self.firebase_key).map_err(|e| ConfigError::InvalidValue {
            key: "FIREBASE_KEY".to_string(),
            reason: e.to_string(),
        })
    }

    /// Firestore 项目 ID：显式配置优先，其次取密钥中的 `project_id`
    pub fn firestore_project(&self, key: &ServiceAccountKey) -> Option<String> {
        Some(self.firestore_project_id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| key.project_id.clone().filter(|id| !id.trim().is_empty()))
    }
}

fn parse_or<T, F>(var_name: &str, current: T, lookup: &F) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: std::any::type_name::<T>().to_string(),
            }),
        None => Ok(current),
    }
}
