//! 测验的答卷列表
//!
//! 上传流程：先显示"上传中"占位，写入图片，再创建答卷文档。
//! 两步之间没有事务，中途失败可能留下孤立的图片。

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use nanoid::nanoid;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::{get_as, BlobStore, Direction, DocumentStore, FieldUpdates, Query};
use crate::models::paths::{quiz_response_doc_path, quiz_responses_col_path, response_photo_path};
use crate::models::response::fields::*;
use crate::models::QuizResponse;
use crate::stores::live::LiveCollection;

/// 正在上传、尚未生成文档的答卷
#[derive(Debug, Clone, PartialEq)]
pub struct UploadingResponse {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

/// 一份测验的答卷，最新创建的在前
pub struct ResponseStore {
    live: LiveCollection<QuizResponse>,
    blobs: Arc<dyn BlobStore>,
    quiz_id: String,
    uploading: Mutex<Vec<UploadingResponse>>,
}

impl ResponseStore {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        quiz_id: impl Into<String>,
    ) -> AppResult<Self> {
        let quiz_id = quiz_id.into();
        let query = Query::new().order_by(CREATE_DATE, Direction::Descending);
        let live = LiveCollection::open(store, quiz_responses_col_path(&quiz_id), query).await?;
        Ok(Self {
            live,
            blobs,
            quiz_id,
            uploading: Mutex::new(Vec::new()),
        })
    }

    pub fn responses(&self) -> &[QuizResponse] {
        self.live.items()
    }

    pub fn uploading(&self) -> Vec<UploadingResponse> {
        self.uploading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn uploading_count(&self) -> usize {
        self.uploading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 上传答卷照片并创建答卷，返回答卷 ID
    pub async fn upload(&self, photo: Vec<u8>) -> AppResult<String> {
        let response_id = nanoid!();
        self.uploading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(UploadingResponse {
                id: response_id.clone(),
                started_at: Utc::now(),
            });

        let result = self.write_upload(&response_id, photo).await;

        self.uploading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|u| u.id != response_id);

        match result {
            Ok(()) => {
                info!("📤 [测验 {}] 答卷已上传: {}", self.quiz_id, response_id);
                Ok(response_id)
            }
            Err(e) => {
                warn!("❌ [测验 {}] 答卷上传失败: {}", self.quiz_id, e);
                Err(e)
            }
        }
    }

    async fn write_upload(&self, response_id: &str, photo: Vec<u8>) -> AppResult<()> {
        let photo_path =
            response_photo_path(&self.quiz_id, response_id, Utc::now().timestamp_millis());
        self.blobs.put(&photo_path, photo).await?;

        let fields = FieldUpdates::new()
            .server_timestamp(CREATE_DATE)
            .set(PHOTO_CAPTURE_PATH, photo_path)
            .server_timestamp(PHOTO_CAPTURE_SHOULD_PARSE_DATE);
        self.live
            .store()
            .set(&quiz_response_doc_path(&self.quiz_id, response_id), fields)
            .await
    }

    /// 直接从存储读取答卷
    pub async fn get(&self, response_id: &str) -> AppResult<Option<QuizResponse>> {
        get_as(
            self.live.store().as_ref(),
            &quiz_response_doc_path(&self.quiz_id, response_id),
        )
        .await
    }

    /// 先删图片再删文档
    pub async fn delete(&self, response_id: &str) -> AppResult<()> {
        if let Some(response) = self.get(response_id).await? {
            if let Some(photo_path) = response.photo_capture_path.as_deref() {
                match self.blobs.delete(photo_path).await {
                    Err(e) if e.is_not_found() => warn!("图片已不存在: {}", photo_path),
                    other => other?,
                }
            }
        }
        self.live
            .store()
            .delete(&quiz_response_doc_path(&self.quiz_id, response_id))
            .await
    }

    pub async fn refresh(&mut self) -> AppResult<bool> {
        self.live.refresh().await
    }

    pub async fn changed(&mut self) -> AppResult<()> {
        self.live.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::infrastructure::{MemoryBlobStore, MemoryStore};
    use async_trait::async_trait;

    struct FailingBlobStore;

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        async fn put(&self, path: &str, _bytes: Vec<u8>) -> AppResult<()> {
            Err(AppError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ))
        }

        async fn get(&self, path: &str) -> AppResult<Vec<u8>> {
            Err(AppError::not_found(path))
        }

        async fn delete(&self, path: &str) -> AppResult<()> {
            Err(AppError::not_found(path))
        }

        fn public_url(&self, path: &str) -> String {
            path.to_string()
        }
    }

    #[tokio::test]
    async fn upload_writes_blob_then_document() {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new("https://blobs.test"));
        let mut responses = ResponseStore::open(store.clone(), blobs.clone(), "quiz1")
            .await
            .unwrap();

        let first = responses.upload(b"png-1".to_vec()).await.unwrap();
        let second = responses.upload(b"png-2".to_vec()).await.unwrap();
        assert_eq!(responses.uploading_count(), 0);
        responses.refresh().await.unwrap();

        let ids: Vec<&str> = responses.responses().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);

        let response = responses.get(&first).await.unwrap().unwrap();
        let photo_path = response.photo_capture_path.unwrap();
        assert!(photo_path.starts_with(&format!("quizzes/quiz1/responses/{}/photo_", first)));
        assert!(blobs.contains(&photo_path));
        assert!(response.create_date.is_some());
        assert!(response.photo_capture_should_parse_date.is_some());

        responses.delete(&first).await.unwrap();
        assert!(!blobs.contains(&photo_path));
        assert!(responses.get(&first).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_upload_clears_placeholder() {
        let store = Arc::new(MemoryStore::new());
        let responses = ResponseStore::open(store.clone(), Arc::new(FailingBlobStore), "quiz1")
            .await
            .unwrap();

        assert!(responses.upload(b"png".to_vec()).await.is_err());
        assert_eq!(responses.uploading_count(), 0);
        assert!(store.is_empty());
    }
}
