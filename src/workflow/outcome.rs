//! 触发结果
//!
//! 触发器本身不做任何写入：它返回一组要写回当前文档的字段，
//! 以及若干个异步后续任务，由调度器统一执行。

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;

use crate::error::AppResult;
use crate::infrastructure::FieldUpdates;

/// 一个异步后续任务
pub struct FollowUp {
    /// 日志中显示的任务名
    pub label: String,
    pub task: BoxFuture<'static, AppResult<()>>,
}

impl FollowUp {
    pub fn new(
        label: impl Into<String>,
        task: impl Future<Output = AppResult<()>> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            task: Box::pin(task),
        }
    }
}

impl fmt::Debug for FollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowUp").field("label", &self.label).finish()
    }
}

/// 一次触发的结果
#[derive(Debug, Default)]
pub struct TriggerOutcome {
    /// 立即写回触发文档的字段
    pub updates: FieldUpdates,
    pub follow_ups: Vec<FollowUp>,
}

impl TriggerOutcome {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.follow_ups.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.follow_ups.iter().map(|f| f.label.as_str()).collect()
    }
}
