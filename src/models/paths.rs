//! 文档与文件路径
//!
//! 文档路径：`students/{id}`、`quizzes/{id}`、`quizzes/{id}/responses/{id}`
//! 文件路径：`quizzes/{quizId}/responses/{responseId}/photo_{millis}.png`

use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

pub const STUDENTS_COL_PATH: &str = "students";
pub const QUIZZES_COL_PATH: &str = "quizzes";

pub fn student_doc_path(student_id: &str) -> String {
    format!("{}/{}", STUDENTS_COL_PATH, student_id)
}

pub fn quiz_doc_path(quiz_id: &str) -> String {
    format!("{}/{}", QUIZZES_COL_PATH, quiz_id)
}

pub fn quiz_responses_col_path(quiz_id: &str) -> String {
    format!("{}/responses", quiz_doc_path(quiz_id))
}

pub fn quiz_response_doc_path(quiz_id: &str, response_id: &str) -> String {
    format!("{}/{}", quiz_responses_col_path(quiz_id), response_id)
}

pub fn response_photo_path(quiz_id: &str, response_id: &str, timestamp_millis: i64) -> String {
    format!(
        "{}/photo_{}.png",
        quiz_response_doc_path(quiz_id, response_id),
        timestamp_millis
    )
}

/// 文档路径对应的触发器路由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocRoute {
    Quiz { quiz_id: String },
    QuizResponse { quiz_id: String, response_id: String },
    Student { student_id: String },
    Other,
}

impl DocRoute {
    pub fn of(path: &str) -> Self {
        static ROUTE_RE: OnceLock<Option<Regex>> = OnceLock::new();
        let re = ROUTE_RE.get_or_init(|| {
            Regex::new(r"^(?:quizzes/([^/]+)(?:/responses/([^/]+))?|students/([^/]+))$")
                .map_err(|e| error!("❌ 路由正则无效，所有写入都不会触发流程: {}", e))
                .ok()
        });

        let Some(caps) = re.as_ref().and_then(|re| re.captures(path)) else {
            return DocRoute::Other;
        };

        match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(quiz), Some(response), _) => DocRoute::QuizResponse {
                quiz_id: quiz.as_str().to_string(),
                response_id: response.as_str().to_string(),
            },
            (Some(quiz), None, _) => DocRoute::Quiz {
                quiz_id: quiz.as_str().to_string(),
            },
            (None, _, Some(student)) => DocRoute::Student {
                student_id: student.as_str().to_string(),
            },
            _ => DocRoute::Other,
        }
    }
}

/// 路径是否为文档路径（偶数段、无空段）
pub fn is_doc_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    segments.len() % 2 == 0 && segments.iter().all(|s| !s.is_empty())
}

/// 路径是否为集合路径（奇数段、无空段）
pub fn is_collection_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    segments.len() % 2 == 1 && segments.iter().all(|s| !s.is_empty())
}

/// 拆分文档路径为（集合路径, 文档 ID）
pub fn split_doc_path(path: &str) -> Option<(&str, &str)> {
    if !is_doc_path(path) {
        return None;
    }
    path.rsplit_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_paths() {
        assert_eq!(quiz_response_doc_path("q1", "r1"), "quizzes/q1/responses/r1");
        assert_eq!(
            response_photo_path("q1", "r1", 1700000000000),
            "quizzes/q1/responses/r1/photo_1700000000000.png"
        );
    }

    #[test]
    fn routes_documents() {
        assert_eq!(
            DocRoute::of("quizzes/q1/responses/r9"),
            DocRoute::QuizResponse {
                quiz_id: "q1".into(),
                response_id: "r9".into()
            }
        );
        assert_eq!(DocRoute::of("quizzes/q1"), DocRoute::Quiz { quiz_id: "q1".into() });
        assert_eq!(
            DocRoute::of("students/s1"),
            DocRoute::Student { student_id: "s1".into() }
        );
        assert_eq!(DocRoute::of("quizzes/q1/notes/n1"), DocRoute::Other);
        assert_eq!(DocRoute::of("quizzes"), DocRoute::Other);
    }

    #[test]
    fn classifies_path_kinds() {
        assert!(is_doc_path("quizzes/q1"));
        assert!(!is_doc_path("quizzes/q1/responses"));
        assert!(is_collection_path("quizzes/q1/responses"));
        assert!(!is_collection_path("quizzes//responses"));
        assert_eq!(
            split_doc_path("quizzes/q1/responses/r1"),
            Some(("quizzes/q1/responses", "r1"))
        );
    }
}
