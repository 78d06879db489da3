//! 答卷文档 `quizzes/{quizId}/responses/{responseId}`
//!
//! 每个流水线阶段都有一组可空字段：触发时间、开始时间、结束时间、结果、错误。
//! "处理中"状态完全由这些时间戳推断。

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 图片识别结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuizResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 题目 ID → 学生答案
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ParsedQuizResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn has_answers(&self) -> bool {
        self.answers.as_ref().is_some_and(|a| !a.is_empty())
    }
}

/// 单题评分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGrade {
    pub question_id: String,
    pub student_answer: String,
    pub points_earned: f64,
    pub max_points: f64,
    pub explanation: String,
}

/// 整份答卷的评分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizGrade {
    pub question_grades: Vec<QuestionGrade>,
    pub total_points_earned: f64,
    pub total_possible_points: f64,
    pub summary: String,
}

impl QuizGrade {
    /// 得分率，满分为 0 时返回 None
    pub fn score_fraction(&self) -> Option<f64> {
        (self.total_possible_points > 0.0)
            .then(|| self.total_points_earned / self.total_possible_points)
    }
}

/// 答卷文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,

    // --- 图片 ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_date: Option<DateTime<Utc>>,

    // --- 识别阶段 ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_should_parse_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parse_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parse_end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parsed_info: Option<ParsedQuizResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parse_error: Option<String>,

    // --- 学生匹配阶段 ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parsed_student_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parsed_student_id_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_capture_parsed_student_id_end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_student_id: Option<String>,
    /// 最终归属的学生：手动指定优先，否则取匹配结果
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,

    // --- 评分阶段 ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_grade_should_run_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_grade_run_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_grade_run_end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_grade_results: Option<QuizGrade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_grade_error: Option<String>,
}

impl QuizResponse {
    /// 手动指定优先，否则取模型匹配结果
    pub fn resolved_student_id(&self) -> Option<&str> {
        non_empty(self.manual_student_id.as_deref())
            .or_else(|| non_empty(self.photo_capture_parsed_student_id.as_deref()))
    }

    pub fn parsed_student_name(&self) -> Option<&str> {
        non_empty(
            self.photo_capture_parsed_info
                .as_ref()
                .and_then(|info| info.student_name.as_deref()),
        )
    }

    /// 识别阶段是否处理中
    pub fn is_processing_parse(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let latest = latest_defined(&[
            self.create_date,
            self.photo_capture_should_parse_date,
            self.photo_capture_parse_start_date,
        ]);
        is_pending(latest, self.photo_capture_parse_end_date, now, window)
    }

    /// 评分阶段是否处理中
    pub fn is_processing_grade(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let latest = latest_defined(&[
            self.create_date,
            self.auto_grade_should_run_date,
            self.auto_grade_run_start_date,
        ]);
        is_pending(latest, self.auto_grade_run_end_date, now, window)
    }

    /// 学生归属是否处理中
    ///
    /// 手动指定尚未同步到 `student_id` 时视为处理中；
    /// 未识别出姓名时不会进入匹配阶段。
    pub fn is_processing_student(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if let Some(manual) = &self.manual_student_id {
            return Some(manual) != self.student_id.as_ref();
        }

        if self.parsed_student_name().is_none() {
            return false;
        }

        let latest = latest_defined(&[
            self.create_date,
            self.photo_capture_parse_end_date,
            self.photo_capture_parsed_student_id_start_date,
        ]);
        if !is_recent(latest, now, window) {
            return false;
        }

        match self.photo_capture_parsed_student_id_end_date {
            None => true,
            Some(_) => self
                .photo_capture_parsed_student_id
                .as_ref()
                .is_some_and(|parsed| Some(parsed) != self.student_id.as_ref()),
        }
    }
}

/// 答卷文档字段名
pub mod fields {
    pub const CREATE_DATE: &str = "createDate";
    pub const PHOTO_CAPTURE_PATH: &str = "photoCapturePath";
    pub const PHOTO_CAPTURE_DATE: &str = "photoCaptureDate";
    pub const PHOTO_CAPTURE_SHOULD_PARSE_DATE: &str = "photoCaptureShouldParseDate";
    pub const PHOTO_CAPTURE_PARSE_START_DATE: &str = "photoCaptureParseStartDate";
    pub const PHOTO_CAPTURE_PARSE_END_DATE: &str = "photoCaptureParseEndDate";
    pub const PHOTO_CAPTURE_PARSED_INFO: &str = "photoCaptureParsedInfo";
    pub const PHOTO_CAPTURE_PARSE_ERROR: &str = "photoCaptureParseError";
    pub const PHOTO_CAPTURE_PARSED_STUDENT_ID: &str = "photoCaptureParsedStudentId";
    pub const PHOTO_CAPTURE_PARSED_STUDENT_ID_START_DATE: &str =
        "photoCaptureParsedStudentIdStartDate";
    pub const PHOTO_CAPTURE_PARSED_STUDENT_ID_END_DATE: &str = "photoCaptureParsedStudentIdEndDate";
    pub const MANUAL_STUDENT_ID: &str = "manualStudentId";
    pub const STUDENT_ID: &str = "studentId";
    pub const AUTO_GRADE_SHOULD_RUN_DATE: &str = "autoGradeShouldRunDate";
    pub const AUTO_GRADE_RUN_START_DATE: &str = "autoGradeRunStartDate";
    pub const AUTO_GRADE_RUN_END_DATE: &str = "autoGradeRunEndDate";
    pub const AUTO_GRADE_RESULTS: &str = "autoGradeResults";
    pub const AUTO_GRADE_ERROR: &str = "autoGradeError";
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn latest_defined(timestamps: &[Option<DateTime<Utc>>]) -> Option<DateTime<Utc>> {
    timestamps.iter().flatten().copied().max()
}

fn is_recent(latest: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match (latest, chrono::Duration::from_std(window)) {
        (Some(latest), Ok(window)) => now - latest < window,
        _ => false,
    }
}

fn is_pending(
    latest: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    if !is_recent(latest, now, window) {
        return false;
    }
    match (latest, end) {
        (_, None) => true,
        (Some(latest), Some(end)) => latest > end,
        (None, Some(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const WINDOW: Duration = Duration::from_secs(30);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn manual_override_wins_over_match() {
        let response = QuizResponse {
            manual_student_id: Some("manual".into()),
            photo_capture_parsed_student_id: Some("matched".into()),
            ..Default::default()
        };
        assert_eq!(response.resolved_student_id(), Some("manual"));

        let response = QuizResponse {
            manual_student_id: Some("  ".into()),
            photo_capture_parsed_student_id: Some("matched".into()),
            ..Default::default()
        };
        assert_eq!(response.resolved_student_id(), Some("matched"));
    }

    #[test]
    fn parse_is_processing_until_end_is_newer() {
        let mut response = QuizResponse {
            create_date: Some(at(0)),
            photo_capture_parse_start_date: Some(at(1)),
            ..Default::default()
        };
        assert!(response.is_processing_parse(at(5), WINDOW));

        response.photo_capture_parse_end_date = Some(at(4));
        assert!(!response.is_processing_parse(at(5), WINDOW));

        // 重新识别：新的触发时间晚于上一次结束时间
        response.photo_capture_should_parse_date = Some(at(10));
        assert!(response.is_processing_parse(at(12), WINDOW));
    }

    #[test]
    fn stale_stage_is_not_processing() {
        let response = QuizResponse {
            create_date: Some(at(0)),
            auto_grade_run_start_date: Some(at(1)),
            ..Default::default()
        };
        assert!(response.is_processing_grade(at(20), WINDOW));
        assert!(!response.is_processing_grade(at(60), WINDOW));
    }

    #[test]
    fn student_processing_rules() {
        let mut response = QuizResponse {
            create_date: Some(at(0)),
            manual_student_id: Some("s1".into()),
            ..Default::default()
        };
        assert!(response.is_processing_student(at(1), WINDOW));
        response.student_id = Some("s1".into());
        assert!(!response.is_processing_student(at(1), WINDOW));

        let mut response = QuizResponse {
            create_date: Some(at(0)),
            ..Default::default()
        };
        // 没有识别出姓名
        assert!(!response.is_processing_student(at(1), WINDOW));

        response.photo_capture_parsed_info = Some(ParsedQuizResponse {
            student_name: Some("Ada".into()),
            ..Default::default()
        });
        response.photo_capture_parse_end_date = Some(at(2));
        assert!(response.is_processing_student(at(3), WINDOW));

        response.photo_capture_parsed_student_id_end_date = Some(at(4));
        assert!(!response.is_processing_student(at(5), WINDOW));

        response.photo_capture_parsed_student_id = Some("s2".into());
        assert!(response.is_processing_student(at(5), WINDOW));
        response.student_id = Some("s2".into());
        assert!(!response.is_processing_student(at(5), WINDOW));
    }

    #[test]
    fn score_fraction_ignores_empty_quizzes() {
        let grade = QuizGrade {
            question_grades: vec![],
            total_points_earned: 0.0,
            total_possible_points: 0.0,
            summary: String::new(),
        };
        assert_eq!(grade.score_fraction(), None);
    }
}
