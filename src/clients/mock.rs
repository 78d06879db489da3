//! 脚本化的模型客户端
//!
//! 按输出格式名称（schema 名或 `text`）排队预置回复，并记录每一次请求，
//! 用于在不联网的情况下驱动整条流水线。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::clients::model_client::{Completion, ContentPart, ModelClient, ModelRequest, OutputFormat};
use crate::error::{AppError, AppResult, LlmError};

#[derive(Debug)]
struct MockError(String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MockError {}

enum Reply {
    Structured(JsonValue),
    Text(String),
    Error(String),
}

/// 脚本化模型客户端
#[derive(Default)]
pub struct MockModelClient {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, format_name: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(format_name.to_string())
            .or_default()
            .push_back(reply);
    }

    /// 预置结构化回复
    pub fn reply_structured(&self, schema_name: &str, value: JsonValue) -> &Self {
        self.push(schema_name, Reply::Structured(value));
        self
    }

    /// 预置纯文本回复
    pub fn reply_text(&self, text: impl Into<String>) -> &Self {
        self.push("text", Reply::Text(text.into()));
        self
    }

    /// 预置一次调用失败
    pub fn reply_error(&self, format_name: &str, message: impl Into<String>) -> &Self {
        self.push(format_name, Reply::Error(message.into()));
        self
    }

    /// 已收到的所有请求
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 某种输出格式收到的请求
    pub fn requests_for(&self, format_name: &str) -> Vec<ModelRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.format.name() == format_name)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn complete(
        &self,
        parts: Vec<ContentPart>,
        format: OutputFormat,
    ) -> AppResult<Completion> {
        let format_name = format.name().to_string();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ModelRequest { parts, format });

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&format_name)
            .and_then(VecDeque::pop_front);

        match reply {
            Some(Reply::Structured(value)) => Ok(Completion::Structured(value)),
            Some(Reply::Text(text)) => Ok(Completion::Text(text)),
            Some(Reply::Error(message)) => {
                Err(AppError::llm_api_failed(self.model_name(), MockError(message)))
            }
            None => Err(LlmError::EmptyResponse {
                model: self.model_name().to_string(),
            }
            .into()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
