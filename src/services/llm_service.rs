//! LLM 服务 - 业务能力层
//!
//! 只负责"调用文本生成模型"能力，不关心题目如何校验
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Gemini 的 OpenAI 兼容端点）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::TextGenerator;

/// 出题需要一定随机性
const GENERATION_TEMPERATURE: f32 = 0.9;

/// LLM 服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（去掉首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String, OpenAIError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.chars().count());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(GENERATION_TEMPERATURE)
            .max_tokens(512u32)
            .build()?;

        let response = self.client.chat().create(request).await?;

        debug!("LLM API 调用成功");

        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TextGenerator for LlmService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, user_message: &str, system_message: Option<&str>) -> Result<String, LlmError> {
        let content = self
            .send_to_llm(user_message, system_message)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                LlmError::ApiCallFailed {
                    model: self.model_name.clone(),
                    source: Box::new(e),
                }
            })?;

        if content.is_empty() {
            return Err(LlmError::EmptyContent {
                model: self.model_name.clone(),
            });
        }
        Ok(content)
    }
}
