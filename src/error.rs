use thiserror::Error;

use crate::models::Language;

/// 应用程序错误类型
///
/// 每一类错误对应一个外部依赖或一个校验阶段，调用方可以据此区分
/// "没有数据"、"后端不可达" 和 "返回格式错误"。
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（启动阶段致命）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文档库错误
    #[error("文档库错误: {0}")]
    Store(#[from] StoreError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 上传错误
    #[error("上传错误: {0}")]
    Upload(#[from] UploadError),
    /// 提交内容校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
}

impl AppError {
    /// 面向贡献者的简短提示
    ///
    /// 展示层只显示这一行，完整错误链写入日志。
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(_) => "Service is not configured. Please contact the maintainers.".to_string(),
            AppError::Store(_) => "No questions available at the moment. Please try again later.".to_string(),
            AppError::Llm(_) => "Question generation is unavailable right now.".to_string(),
            AppError::Upload(e) => format!("Upload failed: {}", e),
            AppError::Validation(e) => e.user_message(),
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必需的密钥缺失
    #[error("缺少必需的配置项 {key}")]
    MissingSecret { key: String },
    /// 配置值不合法
    #[error("配置项 {key} 不合法: {reason}")]
    InvalidValue { key: String, reason: String },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 文档库（题库）错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 返回错误状态码
    #[error("返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 文档结构不符合预期
    #[error("文档格式错误: {reason}")]
    MalformedDocument { reason: String },
    /// 文档不存在
    #[error("文档不存在: {id}")]
    NotFound { id: String },
    /// 服务账号私钥无法签名
    #[error("JWT签名失败: {source}")]
    SigningFailed {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    /// 令牌地址拒绝了断言
    #[error("访问令牌换取失败: status={status}, body={body}")]
    TokenExchangeFailed { status: u16, body: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不是合法 JSON
    #[error("无法解析LLM返回的JSON (响应: {response}): {source}")]
    MalformedJson {
        response: String,
        #[source]
        source: serde_json::Error,
    },
    /// JSON 缺少必需字段或字段为空
    #[error("LLM返回的JSON缺少字段: {field}")]
    MissingField { field: String },
    /// 生成内容不符合目标文字
    #[error("生成内容不是 {language} 文字: {text}")]
    ScriptMismatch { language: Language, text: String },
}

/// 上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 网络请求失败
    #[error("请求失败 ({path}): {source}")]
    RequestFailed {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// 返回错误状态码
    #[error("返回错误响应 ({path}): status={status}, body={body}")]
    BadResponse {
        path: String,
        status: u16,
        body: String,
    },
    /// 提交时父版本已过期
    #[error("写入冲突 ({path}): 远端版本已变化")]
    Conflict { path: String },
    /// 冲突重试次数耗尽
    #[error("写入冲突 ({path}): 已重试 {attempts} 次")]
    ConflictRetriesExhausted { path: String, attempts: usize },
    /// 元数据序列化失败
    #[error("序列化失败 ({path}): {reason}")]
    Serialize { path: String, reason: String },
}

impl UploadError {
    /// 是否是可以重新读取后重试的冲突
    pub fn is_conflict(&self) -> bool {
        matches!(self, UploadError::Conflict { .. })
    }
}

/// 提交内容校验错误（发生在任何网络调用之前）
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// 没有任何内容
    #[error("提交内容为空")]
    EmptyContribution,
    /// 要求文字但文字为空
    #[error("缺少文字内容")]
    MissingText,
    /// 文字过短
    #[error("文字过短: 至少需要 {min} 个字符, 实际 {actual} 个")]
    TooShort { min: usize, actual: usize },
    /// 文字不符合目标文字系统
    #[error("文字不是 {language} 文字 (占比 {ratio:.2})")]
    ScriptMismatch { language: Language, ratio: f64 },
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::EmptyContribution => {
                "Please add text, audio or an image before submitting.".to_string()
            }
            ValidationError::MissingText => "Text is required to submit.".to_string(),
            ValidationError::TooShort { min, .. } => {
                format!("Text is too short. Please write at least {} letters.", min)
            }
            ValidationError::ScriptMismatch { language, .. } => format!(
                "Please type your answer in {} script.",
                language.script_name()
            ),
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
