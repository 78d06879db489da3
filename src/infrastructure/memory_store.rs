//! 内存文档存储
//!
//! 所有文档保存在一个按路径排序的 map 中，可以整体保存为 JSON 快照文件，
//! 供命令行在多次运行之间保留状态。

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::error::{AppError, AppResult, StoreError};
use crate::infrastructure::document_store::{
    DocChange, Document, DocumentStore, FieldUpdates, Query, Snapshot,
};
use crate::models::paths::{is_collection_path, is_doc_path, split_doc_path};

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, Document>,
    /// 上一次发放的服务端时间戳，保证严格递增
    last_timestamp: Option<DateTime<Utc>>,
}

/// 内存文档存储
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<UnboundedSender<DocChange>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用已有文档初始化
    pub fn with_documents(docs: BTreeMap<String, Document>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                docs,
                last_timestamp: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// 从快照文件加载，文件不存在时返回空存储
    pub async fn load_snapshot(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("快照文件不存在，使用空存储: {}", path.display());
            return Ok(Self::new());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        let docs: BTreeMap<String, Document> =
            serde_json::from_str(&content).map_err(|source| StoreError::Decode {
                path: path.display().to_string(),
                source,
            })?;

        debug!("已加载 {} 个文档: {}", docs.len(), path.display());
        Ok(Self::with_documents(docs))
    }

    /// 保存快照文件
    pub async fn save_snapshot(&self, path: &Path) -> AppResult<()> {
        let content = {
            let inner = self.lock_inner();
            serde_json::to_string_pretty(&inner.docs).map_err(|source| StoreError::Encode {
                path: path.display().to_string(),
                source,
            })?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::io(parent.display().to_string(), e))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock_inner().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 在持有 inner 锁时调用，保证变更推送顺序与写入顺序一致
    fn emit(&self, change: DocChange) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|tx| tx.send(change.clone()).is_ok());
    }

    fn write(
        &self,
        path: &str,
        build: impl FnOnce(Option<&Document>, &JsonValue) -> AppResult<Option<Document>>,
    ) -> AppResult<()> {
        let mut inner = self.lock_inner();
        let now = next_timestamp(&mut inner);
        let before = inner.docs.get(path).cloned();
        let after = build(before.as_ref(), &now)?;

        if before == after {
            return Ok(());
        }

        match &after {
            Some(doc) => {
                inner.docs.insert(path.to_string(), doc.clone());
            }
            None => {
                inner.docs.remove(path);
            }
        }

        self.emit(DocChange {
            path: path.to_string(),
            before,
            after,
        });
        Ok(())
    }
}

fn next_timestamp(inner: &mut Inner) -> JsonValue {
    let mut now = Utc::now();
    if let Some(last) = inner.last_timestamp {
        if now <= last {
            now = last + chrono::Duration::microseconds(1);
        }
    }
    inner.last_timestamp = Some(now);
    JsonValue::String(now.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn ensure_doc_path(path: &str) -> AppResult<()> {
    if is_doc_path(path) {
        Ok(())
    } else {
        Err(AppError::invalid_path(path, "document paths need an even number of segments"))
    }
}

fn ensure_collection_path(path: &str) -> AppResult<()> {
    if is_collection_path(path) {
        Ok(())
    } else {
        Err(AppError::invalid_path(path, "collection paths need an odd number of segments"))
    }
}

fn to_new_document(fields: &FieldUpdates, now: &JsonValue) -> Document {
    let mut doc = Document::new();
    fields.apply_to(&mut doc, now);
    doc
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> AppResult<Option<Snapshot>> {
        ensure_doc_path(path)?;
        let inner = self.lock_inner();
        Ok(inner.docs.get(path).map(|data| Snapshot {
            id: path.rsplit('/').next().unwrap_or_default().to_string(),
            path: path.to_string(),
            data: data.clone(),
        }))
    }

    async fn set(&self, path: &str, fields: FieldUpdates) -> AppResult<()> {
        ensure_doc_path(path)?;
        self.write(path, |_, now| Ok(Some(to_new_document(&fields, now))))
    }

    async fn add(&self, collection: &str, fields: FieldUpdates) -> AppResult<String> {
        ensure_collection_path(collection)?;
        let id = nanoid::nanoid!();
        let path = format!("{}/{}", collection, id);
        self.write(&path, |_, now| Ok(Some(to_new_document(&fields, now))))?;
        Ok(id)
    }

    async fn update(&self, path: &str, updates: FieldUpdates) -> AppResult<()> {
        ensure_doc_path(path)?;
        if updates.is_empty() {
            return Ok(());
        }
        self.write(path, |before, now| {
            let mut doc = before.cloned().ok_or_else(|| AppError::not_found(path))?;
            updates.apply_to(&mut doc, now);
            Ok(Some(doc))
        })
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        ensure_doc_path(path)?;
        self.write(path, |_, _| Ok(None))
    }

    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Snapshot>> {
        ensure_collection_path(collection)?;
        let inner = self.lock_inner();
        let mut snapshots: Vec<Snapshot> = inner
            .docs
            .iter()
            .filter_map(|(path, data)| {
                let (parent, id) = split_doc_path(path)?;
                (parent == collection && query.matches(data)).then(|| Snapshot {
                    id: id.to_string(),
                    path: path.clone(),
                    data: data.clone(),
                })
            })
            .collect();
        query.arrange(&mut snapshots);
        Ok(snapshots)
    }

    fn subscribe(&self) -> UnboundedReceiver<DocChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document_store::{get_as, Direction};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn set_get_update_delete_roundtrip() {
        let store = MemoryStore::new();
        assert_ok!(store.set("students/s1", FieldUpdates::new().set("name", "Ada")).await);

        let snap = store.get("students/s1").await.unwrap().unwrap();
        assert_eq!(snap.id, "s1");
        assert_eq!(snap.data.get("name"), Some(&json!("Ada")));

        store
            .update(
                "students/s1",
                FieldUpdates::new().set("notes", "front row").delete("name"),
            )
            .await
            .unwrap();
        let snap = store.get("students/s1").await.unwrap().unwrap();
        assert!(snap.data.get("name").is_none());
        assert_eq!(snap.data.get("notes"), Some(&json!("front row")));

        store.delete("students/s1").await.unwrap();
        assert!(store.get("students/s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("quizzes/missing", FieldUpdates::new().set("name", "x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn rejects_malformed_paths() {
        let store = MemoryStore::new();
        assert_err!(store.get("quizzes").await);
        assert_err!(store.add("quizzes/q1", FieldUpdates::new()).await);
    }

    #[tokio::test]
    async fn changes_are_pushed_in_order() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        let id = store
            .add("quizzes", FieldUpdates::new().set("name", "A"))
            .await
            .unwrap();
        let path = format!("quizzes/{}", id);
        store
            .update(&path, FieldUpdates::new().set("name", "B"))
            .await
            .unwrap();
        // 内容不变的写入不产生变更
        store
            .update(&path, FieldUpdates::new().set("name", "B"))
            .await
            .unwrap();
        store.delete(&path).await.unwrap();

        let created = rx.try_recv().unwrap();
        assert!(created.is_create());
        let updated = rx.try_recv().unwrap();
        assert_eq!(updated.after.unwrap().get("name"), Some(&json!("B")));
        let deleted = rx.try_recv().unwrap();
        assert!(deleted.is_delete());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn server_timestamps_strictly_increase() {
        let store = MemoryStore::new();
        store.set("quizzes/q1", FieldUpdates::new()).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..5 {
            store
                .update("quizzes/q1", FieldUpdates::new().server_timestamp("t"))
                .await
                .unwrap();
            let snap = store.get("quizzes/q1").await.unwrap().unwrap();
            seen.push(snap.data["t"].as_str().unwrap().to_string());
        }
        let mut sorted = seen.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn query_scopes_to_direct_children() {
        let store = MemoryStore::new();
        store
            .set("quizzes/q1", FieldUpdates::new().set("name", "quiz"))
            .await
            .unwrap();
        for (id, order) in [("r1", 2), ("r2", 1)] {
            store
                .set(
                    &format!("quizzes/q1/responses/{}", id),
                    FieldUpdates::new().set("n", order),
                )
                .await
                .unwrap();
        }

        let all_quizzes = store.query("quizzes", &Query::new()).await.unwrap();
        assert_eq!(all_quizzes.len(), 1);

        let responses = store
            .query(
                "quizzes/q1/responses",
                &Query::new().order_by("n", Direction::Ascending),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = responses.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("documents.json");

        let store = MemoryStore::new();
        store
            .set(
                "students/s1",
                FieldUpdates::new().set("name", "Ada").set("educatorUserId", "t1"),
            )
            .await
            .unwrap();
        store.save_snapshot(&path).await.unwrap();

        let reloaded = MemoryStore::load_snapshot(&path).await.unwrap();
        let student: crate::models::Student =
            get_as(&reloaded, "students/s1").await.unwrap().unwrap();
        assert_eq!(student.id, "s1");
        assert_eq!(student.name, "Ada");
    }
}
