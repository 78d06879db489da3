//! OpenAI 兼容接口的模型客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 结构化输出通过 `response_format = json_schema` 约束

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::clients::model_client::{Completion, ContentPart, ModelClient, OutputFormat};
use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::utils::logging::truncate_text;

/// 模型客户端
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl LlmClient {
    /// 创建新的模型客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        }
    }

    fn build_user_message(
        &self,
        parts: Vec<ContentPart>,
    ) -> AppResult<ChatCompletionRequestMessage> {
        let content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = parts
            .into_iter()
            .map(|part| match part {
                ContentPart::Text(text) => ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText { text },
                ),
                ContentPart::ImageUrl(url) => {
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url,
                                detail: Some(ImageDetail::Auto),
                            },
                        },
                    )
                }
            })
            .collect();

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        Ok(ChatCompletionRequestMessage::User(user_msg))
    }
}

fn to_response_format(format: &OutputFormat) -> ResponseFormat {
    match format {
        OutputFormat::Text => ResponseFormat::Text,
        OutputFormat::JsonSchema { name, schema } => ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: name.clone(),
                schema: Some(schema.clone()),
                strict: None,
            },
        },
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn complete(
        &self,
        parts: Vec<ContentPart>,
        format: OutputFormat,
    ) -> AppResult<Completion> {
        debug!(
            "调用模型 API，模型: {}，片段数: {}，输出格式: {}",
            self.model_name,
            parts.len(),
            format.name()
        );

        let user_msg = self.build_user_message(parts)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model_name)
            .messages(vec![user_msg])
            .max_tokens(self.max_tokens)
            .response_format(to_response_format(&format));
        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        let request = builder
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("模型 API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            LlmError::EmptyResponse {
                model: self.model_name.clone(),
            }
        })?;
        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("模型 API 调用成功: {}", truncate_text(&content, 120));

        match format {
            OutputFormat::Text => Ok(Completion::Text(content.trim().to_string())),
            OutputFormat::JsonSchema { name, .. } => serde_json::from_str(&content)
                .map(Completion::Structured)
                .map_err(|source| {
                    warn!("结构化输出解析失败 ({}): {}", name, source);
                    LlmError::SchemaMismatch {
                        schema: name,
                        source,
                    }
                    .into()
                }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
