//! 测验列表

use std::sync::Arc;

use tracing::info;

use crate::error::AppResult;
use crate::infrastructure::{Direction, DocumentStore, FieldUpdates, Query};
use crate::models::paths::{quiz_doc_path, QUIZZES_COL_PATH};
use crate::models::quiz::fields::*;
use crate::models::{Question, Quiz};
use crate::stores::live::LiveCollection;

/// 某位教师的测验，最新创建的在前
pub struct QuizStore {
    live: LiveCollection<Quiz>,
    educator_user_id: String,
}

impl QuizStore {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        educator_user_id: impl Into<String>,
    ) -> AppResult<Self> {
        let educator_user_id = educator_user_id.into();
        let query = Query::new()
            .where_eq(EDUCATOR_USER_ID, educator_user_id.as_str())
            .order_by(CREATED_AT, Direction::Descending);
        let live = LiveCollection::open(store, QUIZZES_COL_PATH, query).await?;
        Ok(Self {
            live,
            educator_user_id,
        })
    }

    pub fn quizzes(&self) -> &[Quiz] {
        self.live.items()
    }

    pub fn get(&self, quiz_id: &str) -> Option<&Quiz> {
        self.live.get(quiz_id)
    }

    fn new_quiz(&self, name: &str, questions: &[Question]) -> AppResult<FieldUpdates> {
        FieldUpdates::new()
            .set(NAME, name)
            .set(EDUCATOR_USER_ID, self.educator_user_id.as_str())
            .server_timestamp(CREATED_AT)
            .server_timestamp(UPDATED_AT)
            .set_serialized(QUESTIONS, &questions)
    }

    /// 新建空测验，返回生成的 ID
    pub async fn add(&self, name: &str) -> AppResult<String> {
        let id = self
            .live
            .store()
            .add(QUIZZES_COL_PATH, self.new_quiz(name, &[])?)
            .await?;
        info!("➕ 新增测验 {} ({})", name, id);
        Ok(id)
    }

    /// 以指定 ID 新建或覆盖测验
    pub async fn put(&self, quiz_id: &str, name: &str, questions: &[Question]) -> AppResult<()> {
        self.live
            .store()
            .set(&quiz_doc_path(quiz_id), self.new_quiz(name, questions)?)
            .await
    }

    pub async fn update(&self, quiz_id: &str, name: &str) -> AppResult<()> {
        let updates = FieldUpdates::new()
            .set(NAME, name)
            .server_timestamp(UPDATED_AT);
        self.live.store().update(&quiz_doc_path(quiz_id), updates).await
    }

    pub async fn update_questions(&self, quiz_id: &str, questions: &[Question]) -> AppResult<()> {
        let updates = FieldUpdates::new()
            .server_timestamp(UPDATED_AT)
            .set_serialized(QUESTIONS, &questions)?;
        self.live.store().update(&quiz_doc_path(quiz_id), updates).await
    }

    /// 删除测验文档（答卷子集合保留）
    pub async fn delete(&self, quiz_id: &str) -> AppResult<()> {
        self.live.store().delete(&quiz_doc_path(quiz_id)).await
    }

    /// 请求重新生成总结
    pub async fn resummarize(&self, quiz_id: &str) -> AppResult<()> {
        let updates = FieldUpdates::new().server_timestamp(SUMMARY_SHOULD_RUN_DATE);
        self.live.store().update(&quiz_doc_path(quiz_id), updates).await
    }

    pub async fn refresh(&mut self) -> AppResult<bool> {
        self.live.refresh().await
    }

    pub async fn changed(&mut self) -> AppResult<()> {
        self.live.changed().await
    }
}
