//! 自动评分服务 - 业务能力层
//!
//! 调用模型给出逐题评分，再按答案键校正：
//! - 只保留测验中存在的题目，缺失的题目补 0 分
//! - 得分限制在 `[0, 满分]`
//! - 总分与满分重新累加

use std::sync::Arc;

use tracing::{debug, info};

use crate::clients::{ContentPart, ModelClient, OutputFormat};
use crate::error::{AppResult, BusinessError};
use crate::models::{ParsedQuizResponse, QuestionGrade, Quiz, QuizGrade};
use crate::services::prompts::{grade_prompt, quiz_grade_schema, QUIZ_GRADE_SCHEMA_NAME};

/// 自动评分服务
pub struct AutoGrader {
    client: Arc<dyn ModelClient>,
}

impl AutoGrader {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// 为一份已识别的答卷评分
    ///
    /// 没有任何答案时直接返回 [`BusinessError::NoAnswers`]，不调用模型。
    pub async fn grade(&self, parsed: &ParsedQuizResponse, quiz: &Quiz) -> AppResult<QuizGrade> {
        if !parsed.has_answers() {
            return Err(BusinessError::NoAnswers.into());
        }

        debug!("评分: {} 道题", quiz.questions.len());
        let parts = vec![ContentPart::text(grade_prompt(parsed, quiz))];
        let format = OutputFormat::json_schema(QUIZ_GRADE_SCHEMA_NAME, quiz_grade_schema());

        let raw: QuizGrade = self
            .client
            .complete(parts, format)
            .await?
            .into_structured(QUIZ_GRADE_SCHEMA_NAME)?;

        let grade = normalize_grade(raw, parsed, quiz);
        info!(
            "评分完成: {}/{}",
            grade.total_points_earned, grade.total_possible_points
        );
        Ok(grade)
    }
}

/// 按答案键校正模型给出的评分
pub fn normalize_grade(raw: QuizGrade, parsed: &ParsedQuizResponse, quiz: &Quiz) -> QuizGrade {
    let question_grades: Vec<QuestionGrade> = quiz
        .questions
        .iter()
        .map(|question| {
            let student_answer = parsed
                .answers
                .as_ref()
                .and_then(|answers| answers.get(&question.id))
                .cloned();

            match raw
                .question_grades
                .iter()
                .find(|g| g.question_id == question.id)
            {
                Some(graded) => QuestionGrade {
                    question_id: question.id.clone(),
                    student_answer: student_answer.unwrap_or_else(|| graded.student_answer.clone()),
                    points_earned: graded.points_earned.clamp(0.0, question.points.max(0.0)),
                    max_points: question.points,
                    explanation: graded.explanation.clone(),
                },
                None => QuestionGrade {
                    question_id: question.id.clone(),
                    student_answer: student_answer.unwrap_or_default(),
                    points_earned: 0.0,
                    max_points: question.points,
                    explanation: "No answer was graded for this question.".to_string(),
                },
            }
        })
        .collect();

    let total_points_earned = question_grades.iter().map(|g| g.points_earned).sum();
    let total_possible_points = question_grades.iter().map(|g| g.max_points).sum();

    QuizGrade {
        question_grades,
        total_points_earned,
        total_possible_points,
        summary: raw.summary,
    }
}
