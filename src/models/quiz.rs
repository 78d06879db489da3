use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 测验中的一道题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// 题干
    pub question: String,
    /// 标准答案
    pub answer: String,
    /// 分值
    #[serde(default)]
    pub points: f64,
}

/// 测验文档 `quizzes/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub educator_user_id: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// 所有已评分答卷的平均得分率（0..=1）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    /// 模型生成的整体表现分析
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_should_run_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_run_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_run_end_date: Option<DateTime<Utc>>,
}

impl Quiz {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

/// 测验文档字段名
pub mod fields {
    pub const NAME: &str = "name";
    pub const EDUCATOR_USER_ID: &str = "educatorUserId";
    pub const QUESTIONS: &str = "questions";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const AVERAGE_SCORE: &str = "averageScore";
    pub const SUMMARY: &str = "summary";
    pub const SUMMARY_SHOULD_RUN_DATE: &str = "summaryShouldRunDate";
    pub const SUMMARY_RUN_START_DATE: &str = "summaryRunStartDate";
    pub const SUMMARY_RUN_END_DATE: &str = "summaryRunEndDate";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_document() {
        let quiz: Quiz = serde_json::from_value(json!({
            "id": "q1",
            "name": "Fractions",
            "educatorUserId": "t1",
            "questions": [{"id": "a", "question": "1/2 + 1/2?", "answer": "1", "points": 5}],
            "summaryShouldRunDate": "2025-03-07T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(quiz.id, "q1");
        assert_eq!(quiz.question("a").map(|q| q.points), Some(5.0));
        assert_eq!(quiz.total_points(), 5.0);
        assert!(quiz.summary_should_run_date.is_some());
    }
}
