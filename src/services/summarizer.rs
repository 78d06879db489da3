//! 测验总结服务 - 业务能力层
//!
//! 把所有已评分答卷汇总成一段给教师看的纯文本分析

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::{ContentPart, ModelClient, OutputFormat};
use crate::error::{AppResult, BusinessError};
use crate::models::Question;
use crate::services::prompts::{summary_prompt, ResponseSummary, SUMMARY_ANALYST_PROMPT};

/// 模型没有给出任何文本时使用的总结
pub const EMPTY_SUMMARY_FALLBACK: &str = "Unable to generate summary";

/// 测验总结服务
pub struct QuizSummarizer {
    client: Arc<dyn ModelClient>,
}

impl QuizSummarizer {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// 生成测验总结
    ///
    /// 没有题目或没有答卷时直接返回业务错误，不调用模型。
    pub async fn summarize(
        &self,
        summaries: &[ResponseSummary],
        questions: &[Question],
    ) -> AppResult<String> {
        if questions.is_empty() {
            return Err(BusinessError::NoQuestions.into());
        }
        if summaries.is_empty() {
            return Err(BusinessError::NoResponses.into());
        }

        debug!("总结 {} 份答卷", summaries.len());
        let parts = vec![
            ContentPart::text(SUMMARY_ANALYST_PROMPT),
            ContentPart::text(summary_prompt(summaries, questions)),
        ];

        let text = self
            .client
            .complete(parts, OutputFormat::Text)
            .await?
            .into_text();

        let text = text.trim();
        if text.is_empty() {
            warn!("模型返回的总结为空");
            return Ok(EMPTY_SUMMARY_FALLBACK.to_string());
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockModelClient;
    use crate::error::AppError;
    use crate::models::{QuestionGrade, QuizGrade};

    fn questions() -> Vec<Question> {
        vec![Question {
            id: "q1".into(),
            question: "2 + 2".into(),
            answer: "4".into(),
            points: 10.0,
        }]
    }

    fn summaries() -> Vec<ResponseSummary> {
        vec![ResponseSummary {
            student_id: "s1".into(),
            student_name: "Ada".into(),
            grade: QuizGrade {
                question_grades: vec![QuestionGrade {
                    question_id: "q1".into(),
                    student_answer: "4".into(),
                    points_earned: 10.0,
                    max_points: 10.0,
                    explanation: "Correct".into(),
                }],
                total_points_earned: 10.0,
                total_possible_points: 10.0,
                summary: "Perfect".into(),
            },
        }]
    }

    #[tokio::test]
    async fn empty_inputs_fail_fast() {
        let mock = Arc::new(MockModelClient::new());
        let summarizer = QuizSummarizer::new(mock.clone());

        let err = summarizer.summarize(&summaries(), &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Business(BusinessError::NoQuestions)));

        let err = summarizer.summarize(&[], &questions()).await.unwrap_err();
        assert_eq!(err.to_string(), "The quiz does not have any responses yet.");
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn sends_analyst_and_results() {
        let mock = Arc::new(MockModelClient::new());
        mock.reply_text("  Everyone did well.\n");
        let summary = QuizSummarizer::new(mock.clone())
            .summarize(&summaries(), &questions())
            .await
            .unwrap();
        assert_eq!(summary, "Everyone did well.");

        let request = &mock.requests()[0];
        assert_eq!(request.parts.len(), 2);
        assert!(request.text().contains("Ada:\n- Total Score: 10/10"));
    }

    #[tokio::test]
    async fn blank_output_uses_fallback() {
        let mock = Arc::new(MockModelClient::new());
        mock.reply_text("   ");
        let summary = QuizSummarizer::new(mock)
            .summarize(&summaries(), &questions())
            .await
            .unwrap();
        assert_eq!(summary, EMPTY_SUMMARY_FALLBACK);
    }
}
