//! 实时视图
//!
//! 订阅文档存储的变更，在收到相关变更后重新读取集合或文档。
//! 视图本身不做业务判断，只保证本地状态与存储一致。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::error::AppResult;
use crate::infrastructure::{get_as, query_as, DocChange, DocumentStore, Query};
use crate::models::paths::split_doc_path;
use crate::models::{Quiz, QuizResponse, Student};

/// 带文档 ID 的记录
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Student {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Quiz {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for QuizResponse {
    fn id(&self) -> &str {
        &self.id
    }
}

/// 集合的实时视图
pub struct LiveCollection<T> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    query: Query,
    changes: UnboundedReceiver<DocChange>,
    items: Vec<T>,
}

impl<T: DeserializeOwned + Identified> LiveCollection<T> {
    /// 先订阅再读取，保证读取之后的变更不会丢失
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        query: Query,
    ) -> AppResult<Self> {
        let collection = collection.into();
        let changes = store.subscribe();
        let items = query_as(store.as_ref(), &collection, &query).await?;
        debug!("打开集合视图 {}: {} 条", collection, items.len());

        Ok(Self {
            store,
            collection,
            query,
            changes,
            items,
        })
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 应用所有已到达的变更，返回本地状态是否重新加载
    pub async fn refresh(&mut self) -> AppResult<bool> {
        let mut dirty = false;
        while let Ok(change) = self.changes.try_recv() {
            dirty |= self.is_relevant(&change);
        }
        if dirty {
            self.reload().await?;
        }
        Ok(dirty)
    }

    /// 等待下一次相关变更并重新加载
    pub async fn changed(&mut self) -> AppResult<()> {
        while let Some(change) = self.changes.recv().await {
            if self.is_relevant(&change) {
                break;
            }
        }
        while self.changes.try_recv().is_ok() {}
        self.reload().await
    }

    async fn reload(&mut self) -> AppResult<()> {
        self.items = query_as(self.store.as_ref(), &self.collection, &self.query).await?;
        Ok(())
    }

    fn is_relevant(&self, change: &DocChange) -> bool {
        split_doc_path(&change.path).is_some_and(|(collection, _)| collection == self.collection)
    }
}

/// 单个文档的实时视图
pub struct LiveDocument<T> {
    store: Arc<dyn DocumentStore>,
    path: String,
    changes: UnboundedReceiver<DocChange>,
    value: Option<T>,
}

impl<T: DeserializeOwned> LiveDocument<T> {
    pub async fn open(store: Arc<dyn DocumentStore>, path: impl Into<String>) -> AppResult<Self> {
        let path = path.into();
        let changes = store.subscribe();
        let value = get_as(store.as_ref(), &path).await?;
        Ok(Self {
            store,
            path,
            changes,
            value,
        })
    }

    /// 文档不存在时为 None
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn refresh(&mut self) -> AppResult<bool> {
        let mut dirty = false;
        while let Ok(change) = self.changes.try_recv() {
            dirty |= change.path == self.path;
        }
        if dirty {
            self.value = get_as(self.store.as_ref(), &self.path).await?;
        }
        Ok(dirty)
    }

    pub async fn changed(&mut self) -> AppResult<()> {
        while let Some(change) = self.changes.recv().await {
            if change.path == self.path {
                break;
            }
        }
        while self.changes.try_recv().is_ok() {}
        self.value = get_as(self.store.as_ref(), &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{FieldUpdates, MemoryStore};

    #[tokio::test]
    async fn collection_reloads_only_for_own_changes() {
        let store = Arc::new(MemoryStore::new());
        let mut live: LiveCollection<Student> =
            LiveCollection::open(store.clone(), "students", Query::new())
                .await
                .unwrap();
        assert!(live.items().is_empty());

        store
            .set("quizzes/q1", FieldUpdates::new().set("name", "Quiz"))
            .await
            .unwrap();
        assert!(!live.refresh().await.unwrap());

        store
            .set("students/s1", FieldUpdates::new().set("name", "Ada"))
            .await
            .unwrap();
        assert!(live.refresh().await.unwrap());
        assert_eq!(live.get("s1").map(|s| s.name.as_str()), Some("Ada"));
    }

    #[tokio::test]
    async fn document_waits_for_change() {
        let store = Arc::new(MemoryStore::new());
        let mut live: LiveDocument<Student> = LiveDocument::open(store.clone(), "students/s1")
            .await
            .unwrap();
        assert!(live.value().is_none());

        let writer = store.clone();
        tokio::spawn(async move {
            writer
                .set("students/s2", FieldUpdates::new().set("name", "Other"))
                .await
                .unwrap();
            writer
                .set("students/s1", FieldUpdates::new().set("name", "Ada"))
                .await
                .unwrap();
        });

        live.changed().await.unwrap();
        assert_eq!(live.value().map(|s| s.name.as_str()), Some("Ada"));
    }
}
