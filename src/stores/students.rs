//! 学生名册

use std::sync::Arc;

use tracing::info;

use crate::error::AppResult;
use crate::infrastructure::{Direction, DocumentStore, FieldUpdates, Query};
use crate::models::paths::{student_doc_path, STUDENTS_COL_PATH};
use crate::models::student::fields::*;
use crate::models::Student;
use crate::stores::live::LiveCollection;

/// 某位教师的学生名册，按姓名排序
pub struct StudentStore {
    live: LiveCollection<Student>,
    educator_user_id: String,
}

impl StudentStore {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        educator_user_id: impl Into<String>,
    ) -> AppResult<Self> {
        let educator_user_id = educator_user_id.into();
        let query = Query::new()
            .where_eq(EDUCATOR_USER_ID, educator_user_id.as_str())
            .order_by(NAME, Direction::Ascending);
        let live = LiveCollection::open(store, STUDENTS_COL_PATH, query).await?;
        Ok(Self {
            live,
            educator_user_id,
        })
    }

    pub fn students(&self) -> &[Student] {
        self.live.items()
    }

    pub fn get(&self, student_id: &str) -> Option<&Student> {
        self.live.get(student_id)
    }

    fn new_student(&self, name: &str, notes: &str) -> FieldUpdates {
        FieldUpdates::new()
            .set(NAME, name.trim())
            .set(NOTES, notes)
            .set(EDUCATOR_USER_ID, self.educator_user_id.as_str())
            .server_timestamp(CREATED_AT)
            .server_timestamp(UPDATED_AT)
    }

    /// 新建学生，返回生成的 ID
    pub async fn add(&self, name: &str, notes: &str) -> AppResult<String> {
        let id = self
            .live
            .store()
            .add(STUDENTS_COL_PATH, self.new_student(name, notes))
            .await?;
        info!("➕ 新增学生 {} ({})", name, id);
        Ok(id)
    }

    /// 以指定 ID 新建或覆盖学生
    pub async fn put(&self, student_id: &str, name: &str, notes: &str) -> AppResult<()> {
        self.live
            .store()
            .set(&student_doc_path(student_id), self.new_student(name, notes))
            .await
    }

    /// 只更新给出的字段
    pub async fn update(
        &self,
        student_id: &str,
        name: Option<&str>,
        notes: Option<&str>,
    ) -> AppResult<()> {
        let mut updates = FieldUpdates::new().server_timestamp(UPDATED_AT);
        if let Some(name) = name {
            updates = updates.set(NAME, name.trim());
        }
        if let Some(notes) = notes {
            updates = updates.set(NOTES, notes);
        }
        self.live
            .store()
            .update(&student_doc_path(student_id), updates)
            .await
    }

    pub async fn delete(&self, student_id: &str) -> AppResult<()> {
        self.live.store().delete(&student_doc_path(student_id)).await
    }

    pub async fn refresh(&mut self) -> AppResult<bool> {
        self.live.refresh().await
    }

    pub async fn changed(&mut self) -> AppResult<()> {
        self.live.changed().await
    }
}
