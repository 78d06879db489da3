//! 文档存储 - 基础设施层
//!
//! 只暴露"读写文档 + 订阅变更"的能力，不认识 Quiz / Student / QuizResponse。
//!
//! - 文档是 JSON 对象（`serde_json::Map`）
//! - 写入时支持删除标记（[`FieldValue::Delete`]）和服务端时间戳（[`FieldValue::ServerTimestamp`]）
//! - 每次成功写入都会向所有订阅者推送一条 [`DocChange`]，顺序与写入顺序一致

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::{AppResult, StoreError};

/// 文档内容
pub type Document = serde_json::Map<String, JsonValue>;

/// 读取到的文档
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: String,
    pub path: String,
    pub data: Document,
}

impl Snapshot {
    /// 解码为指定类型，文档 ID 会以 `id` 字段注入
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        decode_document(&self.path, &self.id, &self.data)
    }
}

pub(crate) fn decode_document<T: DeserializeOwned>(
    path: &str,
    id: &str,
    data: &Document,
) -> AppResult<T> {
    let mut data = data.clone();
    data.insert("id".to_string(), JsonValue::String(id.to_string()));
    serde_json::from_value(JsonValue::Object(data)).map_err(|source| {
        StoreError::Decode {
            path: path.to_string(),
            source,
        }
        .into()
    })
}

/// 单个字段的写入值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Set(JsonValue),
    /// 删除该字段
    Delete,
    /// 由存储在写入时填充当前时间
    ServerTimestamp,
}

/// 一次写入涉及的字段集合（字段名不支持嵌套路径）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, FieldValue::Set(value.into()));
        self
    }

    /// 序列化后写入，`None` 等可选值序列化为 null 时改为删除字段
    pub fn set_serialized<T: Serialize>(self, key: impl Into<String>, value: &T) -> AppResult<Self> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            path: key.clone(),
            source,
        })?;
        Ok(if value.is_null() {
            self.delete(key)
        } else {
            self.set(key, value)
        })
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.insert(key, FieldValue::Delete);
        self
    }

    pub fn server_timestamp(mut self, key: impl Into<String>) -> Self {
        self.insert(key, FieldValue::ServerTimestamp);
        self
    }

    fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// 把写入应用到文档上
    pub fn apply_to(&self, doc: &mut Document, now: &JsonValue) {
        for (key, value) in &self.fields {
            match value {
                FieldValue::Set(v) => {
                    doc.insert(key.clone(), v.clone());
                }
                FieldValue::Delete => {
                    doc.remove(key);
                }
                FieldValue::ServerTimestamp => {
                    doc.insert(key.clone(), now.clone());
                }
            }
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// 集合查询：等值过滤 + 单字段排序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, JsonValue)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    /// 对查询结果排序并截断
    pub fn arrange(&self, snapshots: &mut Vec<Snapshot>) {
        if let Some((field, direction)) = &self.order_by {
            snapshots.sort_by(|a, b| {
                let ordering = compare_json(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            snapshots.truncate(limit);
        }
    }
}

/// 缺失 < null < bool < number < string，其余类型视为相等
fn compare_json(a: Option<&JsonValue>, b: Option<&JsonValue>) -> Ordering {
    fn rank(v: Option<&JsonValue>) -> u8 {
        match v {
            None => 0,
            Some(JsonValue::Null) => 1,
            Some(JsonValue::Bool(_)) => 2,
            Some(JsonValue::Number(_)) => 3,
            Some(JsonValue::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(JsonValue::Bool(x)), Some(JsonValue::Bool(y))) => x.cmp(y),
        (Some(JsonValue::Number(x)), Some(JsonValue::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(JsonValue::String(x)), Some(JsonValue::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// 一次文档写入引起的变化
#[derive(Debug, Clone, PartialEq)]
pub struct DocChange {
    pub path: String,
    /// 写入前的内容，新建时为 None
    pub before: Option<Document>,
    /// 写入后的内容，删除时为 None
    pub after: Option<Document>,
}

impl DocChange {
    /// 对写入前后的文档做同一个投影，比较投影结果是否变化（深比较）
    ///
    /// 文档不存在时按空文档处理。
    pub fn transform<R: PartialEq>(&self, project: impl Fn(&Document) -> R) -> FieldChange<R> {
        let empty = Document::new();
        FieldChange {
            old_value: project(self.before.as_ref().unwrap_or(&empty)),
            new_value: project(self.after.as_ref().unwrap_or(&empty)),
        }
    }

    pub fn is_create(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    pub fn is_delete(&self) -> bool {
        self.after.is_none()
    }

    /// 解码写入后的文档
    pub fn after_as<T: DeserializeOwned>(&self) -> AppResult<Option<T>> {
        let Some(after) = &self.after else {
            return Ok(None);
        };
        let id = self.path.rsplit('/').next().unwrap_or_default();
        decode_document(&self.path, id, after).map(Some)
    }
}

/// 投影前后的值
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange<R> {
    pub old_value: R,
    pub new_value: R,
}

impl<R: PartialEq> FieldChange<R> {
    pub fn is_unequal(&self) -> bool {
        self.old_value != self.new_value
    }
}

/// 读取字段（支持 `a.b` 形式的嵌套路径），null 视为不存在
pub fn field_value<'a>(doc: &'a Document, dotted_path: &str) -> Option<&'a JsonValue> {
    let mut segments = dotted_path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

/// 读取非空字符串字段
pub fn field_str<'a>(doc: &'a Document, dotted_path: &str) -> Option<&'a str> {
    field_value(doc, dotted_path)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// 文档存储能力
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 读取文档，不存在时返回 None
    async fn get(&self, path: &str) -> AppResult<Option<Snapshot>>;

    /// 创建或整体覆盖文档（`Delete` 项被忽略）
    async fn set(&self, path: &str, fields: FieldUpdates) -> AppResult<()>;

    /// 在集合中新建文档，返回生成的 ID
    async fn add(&self, collection: &str, fields: FieldUpdates) -> AppResult<String>;

    /// 更新已有文档的部分字段，文档不存在时返回 NotFound
    async fn update(&self, path: &str, updates: FieldUpdates) -> AppResult<()>;

    /// 删除文档，不存在时什么也不做
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// 查询集合中的直接子文档
    async fn query(&self, collection: &str, query: &Query) -> AppResult<Vec<Snapshot>>;

    /// 订阅此后的所有文档变更
    fn subscribe(&self) -> UnboundedReceiver<DocChange>;
}

/// 读取并解码文档
pub async fn get_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &str,
) -> AppResult<Option<T>> {
    match store.get(path).await? {
        Some(snapshot) => snapshot.decode().map(Some),
        None => Ok(None),
    }
}

/// 查询并解码集合
pub async fn query_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    query: &Query,
) -> AppResult<Vec<T>> {
    store
        .query(collection, query)
        .await?
        .iter()
        .map(Snapshot::decode)
        .collect()
}
