//! 触发器调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **订阅变更**：持有文档存储的变更通道
//! 2. **路由**：答卷文档 → `ResponseTrigger`，测验文档 → `QuizSummaryTrigger`，其余忽略
//! 3. **执行结果**：先把 `updates` 写回触发文档，再并发执行所有后续任务
//! 4. **错误隔离**：单个后续任务失败只记录日志，不影响同批其它任务
//!
//! 变更按到达顺序逐条处理；后续任务产生的写入会排在通道末尾，
//! 因此 [`TriggerDispatcher::run_until_idle`] 会一直处理到整条流水线静止。

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, warn};

use crate::infrastructure::{DocChange, DocumentStore};
use crate::models::DocRoute;
use crate::utils::logging::RunStats;
use crate::workflow::{QuizSummaryTrigger, ResponseTrigger, TriggerCtx, TriggerOutcome};

/// 触发器调度器
pub struct TriggerDispatcher {
    store: Arc<dyn DocumentStore>,
    changes: UnboundedReceiver<DocChange>,
    response_trigger: ResponseTrigger,
    quiz_trigger: QuizSummaryTrigger,
}

impl TriggerDispatcher {
    /// 创建调度器并立即订阅，此后的所有写入都会被处理
    pub fn new(
        store: Arc<dyn DocumentStore>,
        response_trigger: ResponseTrigger,
        quiz_trigger: QuizSummaryTrigger,
    ) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            changes,
            response_trigger,
            quiz_trigger,
        }
    }

    /// 处理所有待处理的变更（包括处理过程中新产生的），直到通道为空
    pub async fn run_until_idle(&mut self) -> RunStats {
        let mut stats = RunStats::default();
        while let Ok(change) = self.changes.try_recv() {
            self.dispatch(change, &mut stats).await;
        }
        stats
    }

    /// 持续处理变更，直到 `shutdown` 完成或通道关闭
    pub async fn run_until<F>(&mut self, shutdown: F) -> RunStats
    where
        F: Future<Output = ()>,
    {
        let mut stats = RunStats::default();
        tokio::pin!(shutdown);
        loop {
            let change = tokio::select! {
                _ = &mut shutdown => None,
                change = self.changes.recv() => change,
            };
            let Some(change) = change else {
                break;
            };
            self.dispatch(change, &mut stats).await;
        }
        stats
    }

    /// 路由并执行一次变更
    pub async fn dispatch(&self, change: DocChange, stats: &mut RunStats) {
        let (ctx, outcome) = match DocRoute::of(&change.path) {
            DocRoute::QuizResponse {
                quiz_id,
                response_id,
            } => {
                let ctx = TriggerCtx::response(quiz_id, response_id);
                match self.response_trigger.on_change(&ctx, &change) {
                    Ok(outcome) => (ctx, outcome),
                    Err(e) => {
                        error!("{} ❌ 无法处理答卷变更: {}", ctx, e);
                        return;
                    }
                }
            }
            DocRoute::Quiz { quiz_id } => {
                let ctx = TriggerCtx::quiz(quiz_id);
                let outcome = self.quiz_trigger.on_change(&ctx, &change);
                (ctx, outcome)
            }
            DocRoute::Student { .. } | DocRoute::Other => return,
        };

        stats.changes += 1;
        if outcome.is_empty() {
            return;
        }
        self.apply(&ctx, outcome, stats).await;
    }

    async fn apply(&self, ctx: &TriggerCtx, outcome: TriggerOutcome, stats: &mut RunStats) {
        let TriggerOutcome {
            updates,
            follow_ups,
        } = outcome;

        if !updates.is_empty() {
            debug!("{} 写回 {} 个字段", ctx, updates.len());
            match self.store.update(&ctx.doc_path(), updates).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!("{} 文档已被删除，跳过写回", ctx);
                }
                Err(e) => error!("{} ❌ 写回失败: {}", ctx, e),
            }
        }

        let (labels, tasks): (Vec<_>, Vec<_>) =
            follow_ups.into_iter().map(|f| (f.label, f.task)).unzip();
        let results = join_all(tasks).await;

        for (label, result) in labels.iter().zip(results) {
            stats.follow_ups += 1;
            if let Err(e) = result {
                stats.failed += 1;
                error!("{} ❌ {} 失败: {}", ctx, label, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::clients::MockModelClient;
    use crate::infrastructure::{get_as, FieldUpdates, MemoryBlobStore, MemoryStore};
    use crate::models::paths::quiz_doc_path;
    use crate::models::quiz::fields::{QUESTIONS, SUMMARY_SHOULD_RUN_DATE};
    use crate::models::Quiz;
    use crate::services::{AutoGrader, QuizSummarizer, ResponseParser, StudentMatcher};

    fn dispatcher(store: Arc<MemoryStore>) -> TriggerDispatcher {
        let client = Arc::new(MockModelClient::new());
        let response_trigger = ResponseTrigger::new(
            store.clone(),
            Arc::new(MemoryBlobStore::new("https://blobs.test")),
            Arc::new(ResponseParser::new(client.clone())),
            Arc::new(StudentMatcher::new(client.clone(), 0.8)),
            Arc::new(AutoGrader::new(client.clone())),
        );
        let quiz_trigger =
            QuizSummaryTrigger::new(store.clone(), Arc::new(QuizSummarizer::new(client)));
        TriggerDispatcher::new(store, response_trigger, quiz_trigger)
    }

    async fn request_summary(store: &MemoryStore) {
        store
            .set(
                &quiz_doc_path("quiz1"),
                FieldUpdates::new()
                    .set(
                        QUESTIONS,
                        json!([{"id": "q1", "question": "2 + 2", "answer": "4", "points": 1}]),
                    )
                    .server_timestamp(SUMMARY_SHOULD_RUN_DATE),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn drains_follow_up_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut dispatcher = dispatcher(store.clone());
        request_summary(&store).await;
        store
            .set("students/s1", FieldUpdates::new().set("name", "Ada"))
            .await
            .unwrap();

        let stats = dispatcher.run_until_idle().await;
        // 测验创建 + 开始时间写回 + 总结结果写回；学生文档不计入
        assert_eq!(stats.changes, 3);
        assert_eq!(stats.follow_ups, 1);
        assert_eq!(stats.failed, 0);

        let quiz: Quiz = get_as(store.as_ref(), &quiz_doc_path("quiz1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            quiz.summary.as_deref(),
            Some("The quiz does not have any responses yet.")
        );
        assert!(quiz.summary_run_end_date.is_some());

        assert_eq!(dispatcher.run_until_idle().await, RunStats::default());
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let mut dispatcher = dispatcher(store.clone());
        request_summary(&store).await;

        let stats = dispatcher
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await;
        assert_eq!(stats.follow_ups, 1);
    }
}
