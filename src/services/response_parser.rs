//! 答卷识别服务 - 业务能力层
//!
//! 只负责"看图识别姓名与答案"能力，不关心流程

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::{ContentPart, ModelClient, OutputFormat};
use crate::models::{ParsedQuizResponse, Quiz};
use crate::services::prompts::{parse_prompt, quiz_response_schema, QUIZ_RESPONSE_SCHEMA_NAME};

/// 调用失败时写入文档的错误文本
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to process image";

/// 答卷识别服务
pub struct ResponseParser {
    client: Arc<dyn ModelClient>,
}

impl ResponseParser {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// 识别答卷照片
    ///
    /// 不会返回错误：模型调用失败时结果的 `error` 字段为 [`PARSE_FAILURE_MESSAGE`]，
    /// 模型判断不是学生作业时 `error` 字段为模型给出的原因。
    /// 答案只保留测验中存在的题目 ID。
    pub async fn parse(&self, image_url: &str, quiz: &Quiz) -> ParsedQuizResponse {
        debug!("识别答卷图片: {}，题目数: {}", image_url, quiz.questions.len());

        let parts = vec![
            ContentPart::text(parse_prompt(quiz)),
            ContentPart::image_url(image_url),
        ];
        let format = OutputFormat::json_schema(QUIZ_RESPONSE_SCHEMA_NAME, quiz_response_schema());

        let parsed = match self.client.complete(parts, format).await {
            Ok(completion) => completion.into_structured::<ParsedQuizResponse>(QUIZ_RESPONSE_SCHEMA_NAME),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(parsed) => retain_known_answers(parsed, quiz),
            Err(e) => {
                warn!("答卷图片识别失败: {}", e);
                ParsedQuizResponse::failed(PARSE_FAILURE_MESSAGE)
            }
        }
    }
}

fn retain_known_answers(mut parsed: ParsedQuizResponse, quiz: &Quiz) -> ParsedQuizResponse {
    if let Some(answers) = parsed.answers.as_mut() {
        let before = answers.len();
        answers.retain(|id, _| quiz.question(id).is_some());
        if answers.len() < before {
            debug!("丢弃 {} 个无法对应题目的答案", before - answers.len());
        }
    }
    parsed
}
