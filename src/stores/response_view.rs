//! 单份答卷视图
//!
//! 除了实时读取答卷外，还负责三种"重新触发"：手动指定学生、重新识别、重新评分。
//! 写入的都是普通字段，具体处理由触发器完成。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::infrastructure::{get_as, DocumentStore, FieldUpdates};
use crate::models::paths::{quiz_response_doc_path, student_doc_path};
use crate::models::response::fields::*;
use crate::models::{QuizResponse, Student};
use crate::stores::live::LiveDocument;

pub struct ResponseView {
    live: LiveDocument<QuizResponse>,
    student: Option<Student>,
    processing_window: Duration,
}

impl ResponseView {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        quiz_id: &str,
        response_id: &str,
        processing_window: Duration,
    ) -> AppResult<Self> {
        let live = LiveDocument::open(store, quiz_response_doc_path(quiz_id, response_id)).await?;
        Ok(Self {
            live,
            student: None,
            processing_window,
        })
    }

    pub fn response(&self) -> Option<&QuizResponse> {
        self.live.value()
    }

    /// 最近一次 [`Self::load_student`] 读到的学生
    pub fn student(&self) -> Option<&Student> {
        self.student.as_ref()
    }

    pub fn is_processing_parse(&self, now: DateTime<Utc>) -> bool {
        self.response()
            .is_some_and(|r| r.is_processing_parse(now, self.processing_window))
    }

    pub fn is_processing_grade(&self, now: DateTime<Utc>) -> bool {
        self.response()
            .is_some_and(|r| r.is_processing_grade(now, self.processing_window))
    }

    pub fn is_processing_student(&self, now: DateTime<Utc>) -> bool {
        self.response()
            .is_some_and(|r| r.is_processing_student(now, self.processing_window))
    }

    /// 手动指定学生；`None` 表示撤销手动指定，回到自动匹配结果
    pub async fn select_student(&self, student_id: Option<&str>) -> AppResult<()> {
        let updates = match student_id {
            Some(student_id) => FieldUpdates::new().set(MANUAL_STUDENT_ID, student_id),
            None => FieldUpdates::new().delete(MANUAL_STUDENT_ID),
        };
        self.live.store().update(self.live.path(), updates).await
    }

    pub async fn re_parse(&self) -> AppResult<()> {
        let updates = FieldUpdates::new().server_timestamp(PHOTO_CAPTURE_SHOULD_PARSE_DATE);
        self.live.store().update(self.live.path(), updates).await
    }

    pub async fn regrade(&self) -> AppResult<()> {
        let updates = FieldUpdates::new().server_timestamp(AUTO_GRADE_SHOULD_RUN_DATE);
        self.live.store().update(self.live.path(), updates).await
    }

    /// 读取学生，空 ID 时什么也不做
    pub async fn load_student(&mut self, student_id: &str) -> AppResult<Option<&Student>> {
        if student_id.trim().is_empty() {
            return Ok(self.student.as_ref());
        }
        if let Some(student) =
            get_as::<Student>(self.live.store().as_ref(), &student_doc_path(student_id)).await?
        {
            self.student = Some(student);
        }
        Ok(self.student.as_ref())
    }

    pub async fn refresh(&mut self) -> AppResult<bool> {
        self.live.refresh().await
    }

    pub async fn changed(&mut self) -> AppResult<()> {
        self.live.changed().await
    }
}
