//! 测验总结触发器 - 流程层
//!
//! 只在 `summaryShouldRunDate` 变为新的非空值时触发：
//! 汇总所有已评分且已归属学生的答卷，计算平均得分率，请模型写总结。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{AppResult, BusinessError};
use crate::infrastructure::{
    field_value, get_as, query_as, DocChange, Direction, DocumentStore, FieldUpdates, Query,
};
use crate::models::paths::{quiz_responses_col_path, student_doc_path};
use crate::models::quiz::fields::*;
use crate::models::response::fields::CREATE_DATE;
use crate::models::{Quiz, QuizResponse, Student};
use crate::services::{QuizSummarizer, ResponseSummary};
use crate::workflow::outcome::{FollowUp, TriggerOutcome};
use crate::workflow::trigger_ctx::TriggerCtx;

pub const LABEL_SUMMARIZE: &str = "生成测验总结";

/// 找不到学生文档时显示的姓名
const UNKNOWN_STUDENT_NAME: &str = "Unknown student";

/// 测验总结触发器
#[derive(Clone)]
pub struct QuizSummaryTrigger {
    store: Arc<dyn DocumentStore>,
    summarizer: Arc<QuizSummarizer>,
}

impl QuizSummaryTrigger {
    pub fn new(store: Arc<dyn DocumentStore>, summarizer: Arc<QuizSummarizer>) -> Self {
        Self { store, summarizer }
    }

    /// 处理一次测验写入
    pub fn on_change(&self, ctx: &TriggerCtx, change: &DocChange) -> TriggerOutcome {
        let requested = change.transform(|d| field_value(d, SUMMARY_SHOULD_RUN_DATE).cloned());
        if !requested.is_unequal() || requested.new_value.is_none() || change.is_delete() {
            return TriggerOutcome::default();
        }

        info!("{} 📊 启动测验总结", ctx);
        TriggerOutcome {
            updates: FieldUpdates::new().server_timestamp(SUMMARY_RUN_START_DATE),
            follow_ups: vec![FollowUp::new(
                LABEL_SUMMARIZE,
                self.clone().summarize(ctx.clone()),
            )],
        }
    }

    async fn summarize(self, ctx: TriggerCtx) -> AppResult<()> {
        let updates = match self.summary_updates(&ctx).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("{} ❌ 无法读取总结所需的文档: {}", ctx, e);
                FieldUpdates::new().set(SUMMARY, e.to_string())
            }
        }
        .server_timestamp(SUMMARY_RUN_END_DATE);

        match self.store.update(&ctx.quiz_path(), updates).await {
            Err(e) if e.is_not_found() => {
                warn!("{} 测验已不存在，丢弃总结", ctx);
                Ok(())
            }
            other => other,
        }
    }

    /// 平均得分率与总结文本；模型失败时总结为错误描述
    async fn summary_updates(&self, ctx: &TriggerCtx) -> AppResult<FieldUpdates> {
        let quiz: Quiz = get_as(self.store.as_ref(), &ctx.quiz_path())
            .await?
            .ok_or_else(|| BusinessError::QuizNotFound {
                quiz_id: ctx.quiz_id.clone(),
            })?;

        let summaries = self.collect_summaries(ctx).await?;
        let average = average_score(&summaries);
        debug!("{} 计入总结的答卷: {}，平均得分率: {:?}", ctx, summaries.len(), average);

        let summary = match self.summarizer.summarize(&summaries, &quiz.questions).await {
            Ok(text) => {
                info!("{} ✓ 测验总结完成", ctx);
                text
            }
            Err(e) => {
                warn!("{} ❌ 测验总结失败: {}", ctx, e);
                e.to_string()
            }
        };

        Ok(match average {
            Some(average) => FieldUpdates::new().set(AVERAGE_SCORE, average),
            None => FieldUpdates::new().delete(AVERAGE_SCORE),
        }
        .set(SUMMARY, summary))
    }

    /// 按创建时间读取答卷，只保留已评分且已归属学生的
    async fn collect_summaries(&self, ctx: &TriggerCtx) -> AppResult<Vec<ResponseSummary>> {
        let query = Query::new().order_by(CREATE_DATE, Direction::Ascending);
        let responses: Vec<QuizResponse> = query_as(
            self.store.as_ref(),
            &quiz_responses_col_path(&ctx.quiz_id),
            &query,
        )
        .await?;

        let mut summaries = Vec::new();
        for response in responses {
            let (Some(grade), Some(student_id)) = (
                response.auto_grade_results.clone(),
                response.resolved_student_id().map(str::to_owned),
            ) else {
                continue;
            };

            let student: Option<Student> =
                get_as(self.store.as_ref(), &student_doc_path(&student_id)).await?;
            let student_name = student
                .map(|s| s.name)
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_STUDENT_NAME.to_string());

            summaries.push(ResponseSummary {
                student_id,
                student_name,
                grade,
            });
        }
        Ok(summaries)
    }
}

/// 平均得分率，满分为 0 的答卷不计入
pub fn average_score(summaries: &[ResponseSummary]) -> Option<f64> {
    let fractions: Vec<f64> = summaries
        .iter()
        .filter_map(|s| s.grade.score_fraction())
        .collect();
    if fractions.is_empty() {
        return None;
    }
    Some(fractions.iter().sum::<f64>() / fractions.len() as f64)
}
