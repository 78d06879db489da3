//! 触发上下文
//!
//! 封装"我正在处理哪份测验的哪份答卷"这一信息

use std::fmt::Display;

use crate::models::paths::{quiz_doc_path, quiz_response_doc_path};

/// 触发上下文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCtx {
    pub quiz_id: String,

    /// 测验文档触发时为 None
    pub response_id: Option<String>,
}

impl TriggerCtx {
    pub fn quiz(quiz_id: impl Into<String>) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            response_id: None,
        }
    }

    pub fn response(quiz_id: impl Into<String>, response_id: impl Into<String>) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            response_id: Some(response_id.into()),
        }
    }

    pub fn quiz_path(&self) -> String {
        quiz_doc_path(&self.quiz_id)
    }

    /// 答卷文档路径，测验上下文时返回测验路径
    pub fn doc_path(&self) -> String {
        match &self.response_id {
            Some(response_id) => quiz_response_doc_path(&self.quiz_id, response_id),
            None => self.quiz_path(),
        }
    }
}

impl Display for TriggerCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.response_id {
            Some(response_id) => write!(f, "[测验 {} / 答卷 {}]", self.quiz_id, response_id),
            None => write!(f, "[测验 {}]", self.quiz_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_and_display() {
        let ctx = TriggerCtx::response("q1", "r1");
        assert_eq!(ctx.doc_path(), "quizzes/q1/responses/r1");
        assert_eq!(ctx.to_string(), "[测验 q1 / 答卷 r1]");

        let ctx = TriggerCtx::quiz("q1");
        assert_eq!(ctx.doc_path(), "quizzes/q1");
        assert_eq!(ctx.to_string(), "[测验 q1]");
    }
}
