//! 模型调用接口
//!
//! 输入：有序的内容片段（文本 / 图片 URL）+ 可选的 JSON Schema 约束
//! 输出：第一个 choice，结构化（已解析的 JSON）或纯文本
//!
//! 调用失败原样返回给调用方，不做重试。

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::{AppResult, LlmError};

/// 用户消息中的一个内容片段
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    ImageUrl(String),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl(url.into())
    }
}

/// 期望的输出格式
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Text,
    JsonSchema { name: String, schema: JsonValue },
}

impl OutputFormat {
    pub fn json_schema(name: impl Into<String>, schema: JsonValue) -> Self {
        OutputFormat::JsonSchema {
            name: name.into(),
            schema,
        }
    }

    /// schema 名称，纯文本时为 `text`
    pub fn name(&self) -> &str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::JsonSchema { name, .. } => name,
        }
    }
}

/// 模型输出
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Structured(JsonValue),
    Text(String),
}

impl Completion {
    /// 把结构化输出反序列化为目标类型
    pub fn into_structured<T: DeserializeOwned>(self, schema_name: &str) -> AppResult<T> {
        match self {
            Completion::Structured(value) => {
                serde_json::from_value(value).map_err(|source| {
                    LlmError::SchemaMismatch {
                        schema: schema_name.to_string(),
                        source,
                    }
                    .into()
                })
            }
            Completion::Text(_) => Err(LlmError::UnexpectedFormat {
                expected: "structured",
                actual: "text",
            }
            .into()),
        }
    }

    /// 取纯文本输出；结构化输出会被序列化为 JSON 文本
    pub fn into_text(self) -> String {
        match self {
            Completion::Text(text) => text,
            Completion::Structured(value) => value.to_string(),
        }
    }
}

/// 一次模型请求（用于日志与测试记录）
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub parts: Vec<ContentPart>,
    pub format: OutputFormat,
}

impl ModelRequest {
    /// 拼接所有文本片段
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::ImageUrl(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_urls(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ImageUrl(url) => Some(url.as_str()),
                ContentPart::Text(_) => None,
            })
            .collect()
    }
}

/// 模型调用能力
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, parts: Vec<ContentPart>, format: OutputFormat)
        -> AppResult<Completion>;

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Match {
        confidence: f64,
    }

    #[test]
    fn structured_completion_decodes() {
        let m: Match = Completion::Structured(json!({"confidence": 0.9}))
            .into_structured("student_match")
            .unwrap();
        assert_eq!(m.confidence, 0.9);
    }

    #[test]
    fn mismatched_structure_reports_schema() {
        let err = Completion::Structured(json!({"confidence": "high"}))
            .into_structured::<Match>("student_match")
            .unwrap_err();
        assert!(err.to_string().contains("student_match"));

        let err = Completion::Text("hello".into())
            .into_structured::<Match>("student_match")
            .unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn request_splits_text_and_images() {
        let request = ModelRequest {
            parts: vec![
                ContentPart::text("a"),
                ContentPart::image_url("https://x/y.png"),
                ContentPart::text("b"),
            ],
            format: OutputFormat::Text,
        };
        assert_eq!(request.text(), "a\nb");
        assert_eq!(request.image_urls(), vec!["https://x/y.png"]);
        assert_eq!(request.format.name(), "text");
    }
}
