//! 答卷更新触发器 - 流程层
//!
//! 核心职责：根据答卷文档写入前后的差异，决定要清理哪些旧结果、启动哪些阶段
//!
//! 字段组（深比较）：
//! 1. 图片路径：清理识别结果，记录图片时间
//! 2. 识别组（图片路径 + 重新识别时间）：启动图片识别
//! 3. 识别出的姓名：启动学生匹配
//! 4. 学生归属（手动指定 + 匹配结果）：写入最终学生 ID
//! 5. 评分组（识别出的答案 + 重新评分时间）：启动自动评分
//! 6. 最终学生 ID 变化且已有评分：请求重新总结测验

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{AppResult, BusinessError};
use crate::infrastructure::{
    field_str, field_value, get_as, query_as, BlobStore, DocChange, Direction, Document,
    DocumentStore, FieldUpdates, Query,
};
use crate::models::paths::{quiz_doc_path, STUDENTS_COL_PATH};
use crate::models::quiz::fields as quiz_fields;
use crate::models::response::fields::*;
use crate::models::student::fields as student_fields;
use crate::models::{ParsedQuizResponse, Quiz, QuizResponse, Student};
use crate::services::{AutoGrader, ResponseParser, StudentMatcher};
use crate::workflow::outcome::{FollowUp, TriggerOutcome};
use crate::workflow::trigger_ctx::TriggerCtx;

pub const LABEL_PARSE: &str = "识别答卷图片";
pub const LABEL_MATCH: &str = "匹配学生";
pub const LABEL_GRADE: &str = "自动评分";
pub const LABEL_RESUMMARIZE: &str = "请求重新总结";

const PARSED_STUDENT_NAME: &str = "photoCaptureParsedInfo.studentName";
const PARSED_ANSWERS: &str = "photoCaptureParsedInfo.answers";

/// 答卷更新触发器
///
/// - 只根据字段差异决定做什么
/// - 不直接写触发文档，返回 [`TriggerOutcome`] 交给调度器
/// - 后续任务各自把结果（或错误文本）和结束时间写回答卷
#[derive(Clone)]
pub struct ResponseTrigger {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    parser: Arc<ResponseParser>,
    matcher: Arc<StudentMatcher>,
    grader: Arc<AutoGrader>,
}

impl ResponseTrigger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        parser: Arc<ResponseParser>,
        matcher: Arc<StudentMatcher>,
        grader: Arc<AutoGrader>,
    ) -> Self {
        Self {
            store,
            blobs,
            parser,
            matcher,
            grader,
        }
    }

    /// 处理一次答卷写入
    pub fn on_change(&self, ctx: &TriggerCtx, change: &DocChange) -> AppResult<TriggerOutcome> {
        let Some(after) = change.after_as::<QuizResponse>()? else {
            debug!("{} 答卷已删除，忽略", ctx);
            return Ok(TriggerOutcome::default());
        };

        let mut updates = FieldUpdates::new();
        let mut follow_ups = Vec::new();

        // ========== 1. 图片路径 ==========
        let path_change = change.transform(|d| owned_str(d, PHOTO_CAPTURE_PATH));
        if path_change.is_unequal() {
            updates = updates
                .delete(PHOTO_CAPTURE_PARSE_ERROR)
                .delete(PHOTO_CAPTURE_PARSED_INFO);
            updates = if path_change.new_value.is_some() {
                updates.server_timestamp(PHOTO_CAPTURE_DATE)
            } else {
                info!("{} 🗑️ 图片已移除，清理识别结果", ctx);
                updates.delete(PHOTO_CAPTURE_DATE)
            };
        }

        // ========== 2. 识别组 ==========
        let parse_change = change.transform(|d| {
            (
                owned_str(d, PHOTO_CAPTURE_PATH),
                owned_value(d, PHOTO_CAPTURE_SHOULD_PARSE_DATE),
            )
        });
        if parse_change.is_unequal() {
            if let Some(blob_path) = parse_change.new_value.0 {
                info!("{} 📷 启动图片识别: {}", ctx, blob_path);
                updates = updates
                    .delete(PHOTO_CAPTURE_PARSE_ERROR)
                    .delete(PHOTO_CAPTURE_PARSED_INFO)
                    .server_timestamp(PHOTO_CAPTURE_PARSE_START_DATE);
                follow_ups.push(FollowUp::new(
                    LABEL_PARSE,
                    self.clone().parse_photo(ctx.clone(), blob_path),
                ));
            }
        }

        // ========== 3. 识别出的姓名 ==========
        let name_change = change.transform(|d| owned_str(d, PARSED_STUDENT_NAME));
        if name_change.is_unequal() {
            updates = updates.delete(PHOTO_CAPTURE_PARSED_STUDENT_ID);
            if let Some(name) = name_change.new_value {
                info!("{} 🧑 启动学生匹配: {}", ctx, name);
                updates = updates.server_timestamp(PHOTO_CAPTURE_PARSED_STUDENT_ID_START_DATE);
                follow_ups.push(FollowUp::new(
                    LABEL_MATCH,
                    self.clone().match_student(ctx.clone(), name),
                ));
            }
        }

        // ========== 4. 学生归属 ==========
        let resolution_change = change.transform(|d| {
            (
                owned_str(d, MANUAL_STUDENT_ID),
                owned_str(d, PHOTO_CAPTURE_PARSED_STUDENT_ID),
            )
        });
        if resolution_change.is_unequal() {
            updates = match after.resolved_student_id() {
                Some(student_id) => updates.set(STUDENT_ID, student_id),
                None => updates.delete(STUDENT_ID),
            };
        }

        // ========== 5. 评分组 ==========
        let grade_change = change.transform(|d| {
            (
                owned_value(d, PARSED_ANSWERS),
                owned_value(d, AUTO_GRADE_SHOULD_RUN_DATE),
            )
        });
        if grade_change.is_unequal() {
            updates = updates
                .delete(AUTO_GRADE_ERROR)
                .delete(AUTO_GRADE_RESULTS);

            let regrade_requested = grade_change.new_value.1.is_some()
                && grade_change.old_value.1 != grade_change.new_value.1;

            if after.photo_capture_parsed_info.is_some() || regrade_requested {
                info!("{} 📝 启动自动评分", ctx);
                updates = updates.server_timestamp(AUTO_GRADE_RUN_START_DATE);
                let parsed = after.photo_capture_parsed_info.clone().unwrap_or_default();
                follow_ups.push(FollowUp::new(
                    LABEL_GRADE,
                    self.clone().grade_response(ctx.clone(), parsed),
                ));
            }
        }

        // ========== 6. 学生变化后重新总结 ==========
        let student_change = change.transform(|d| owned_str(d, STUDENT_ID));
        if student_change.is_unequal() && after.auto_grade_results.is_some() {
            follow_ups.push(FollowUp::new(
                LABEL_RESUMMARIZE,
                request_summary(self.store.clone(), ctx.clone()),
            ));
        }

        Ok(TriggerOutcome {
            updates,
            follow_ups,
        })
    }

    async fn load_quiz(&self, quiz_id: &str) -> AppResult<Quiz> {
        get_as::<Quiz>(self.store.as_ref(), &quiz_doc_path(quiz_id))
            .await?
            .ok_or_else(|| {
                BusinessError::QuizNotFound {
                    quiz_id: quiz_id.to_string(),
                }
                .into()
            })
    }

    /// 写回答卷；答卷在任务执行期间被删除时只记录日志
    async fn write_back(&self, ctx: &TriggerCtx, updates: FieldUpdates) -> AppResult<()> {
        match self.store.update(&ctx.doc_path(), updates).await {
            Err(e) if e.is_not_found() => {
                warn!("{} 答卷已不存在，丢弃结果", ctx);
                Ok(())
            }
            other => other,
        }
    }

    async fn parse_photo(self, ctx: TriggerCtx, blob_path: String) -> AppResult<()> {
        let updates = match self.run_parse(&ctx, &blob_path).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("{} ❌ 图片识别失败: {}", ctx, e);
                FieldUpdates::new().set(PHOTO_CAPTURE_PARSE_ERROR, e.to_string())
            }
        };
        self.write_back(&ctx, updates.server_timestamp(PHOTO_CAPTURE_PARSE_END_DATE))
            .await
    }

    async fn run_parse(&self, ctx: &TriggerCtx, blob_path: &str) -> AppResult<FieldUpdates> {
        let quiz = self.load_quiz(&ctx.quiz_id).await?;
        let image_url = self.blobs.public_url(blob_path);
        let parsed = self.parser.parse(&image_url, &quiz).await;

        match parsed.error {
            Some(error) => {
                warn!("{} ⚠️ 图片无法识别: {}", ctx, error);
                Ok(FieldUpdates::new()
                    .set(PHOTO_CAPTURE_PARSE_ERROR, error)
                    .delete(PHOTO_CAPTURE_PARSED_INFO))
            }
            None => {
                info!(
                    "{} ✓ 图片识别完成，姓名: {:?}，答案数: {}",
                    ctx,
                    parsed.student_name,
                    parsed.answers.as_ref().map_or(0, |a| a.len())
                );
                FieldUpdates::new()
                    .delete(PHOTO_CAPTURE_PARSE_ERROR)
                    .set_serialized(PHOTO_CAPTURE_PARSED_INFO, &parsed)
            }
        }
    }

    async fn match_student(self, ctx: TriggerCtx, name: String) -> AppResult<()> {
        let updates = match self.run_match(&ctx, &name).await {
            Ok(Some(student_id)) => {
                info!("{} ✓ 匹配到学生: {}", ctx, student_id);
                FieldUpdates::new().set(PHOTO_CAPTURE_PARSED_STUDENT_ID, student_id)
            }
            Ok(None) => {
                info!("{} 未找到可信的学生匹配: {}", ctx, name);
                FieldUpdates::new().delete(PHOTO_CAPTURE_PARSED_STUDENT_ID)
            }
            Err(e) => {
                warn!("{} ❌ 学生匹配失败: {}", ctx, e);
                FieldUpdates::new().delete(PHOTO_CAPTURE_PARSED_STUDENT_ID)
            }
        };
        self.write_back(
            &ctx,
            updates.server_timestamp(PHOTO_CAPTURE_PARSED_STUDENT_ID_END_DATE),
        )
        .await
    }

    async fn run_match(&self, ctx: &TriggerCtx, name: &str) -> AppResult<Option<String>> {
        let quiz = self.load_quiz(&ctx.quiz_id).await?;
        let query = Query::new()
            .where_eq(student_fields::EDUCATOR_USER_ID, quiz.educator_user_id.as_str())
            .order_by(student_fields::NAME, Direction::Ascending);
        let roster: Vec<Student> =
            query_as(self.store.as_ref(), STUDENTS_COL_PATH, &query).await?;
        debug!("{} 名册人数: {}", ctx, roster.len());

        Ok(self.matcher.match_name(name, &roster).await.student_id)
    }

    async fn grade_response(self, ctx: TriggerCtx, parsed: ParsedQuizResponse) -> AppResult<()> {
        let graded = match self.load_quiz(&ctx.quiz_id).await {
            Ok(quiz) => self.grader.grade(&parsed, &quiz).await,
            Err(e) => Err(e),
        };

        let succeeded = graded.is_ok();
        let updates = match graded {
            Ok(grade) => {
                info!(
                    "{} ✓ 评分完成: {}/{}",
                    ctx, grade.total_points_earned, grade.total_possible_points
                );
                FieldUpdates::new()
                    .delete(AUTO_GRADE_ERROR)
                    .set_serialized(AUTO_GRADE_RESULTS, &grade)?
            }
            Err(e) => {
                warn!("{} ❌ 评分失败: {}", ctx, e);
                FieldUpdates::new().set(AUTO_GRADE_ERROR, e.to_string())
            }
        };
        self.write_back(&ctx, updates.server_timestamp(AUTO_GRADE_RUN_END_DATE))
            .await?;

        if !succeeded {
            return Ok(());
        }

        // studentId 尚未写入时由第 6 组在写入后请求总结
        let latest: Option<QuizResponse> = get_as(self.store.as_ref(), &ctx.doc_path()).await?;
        let assigned = latest
            .and_then(|r| r.student_id)
            .is_some_and(|id| !id.trim().is_empty());
        if assigned {
            request_summary(self.store.clone(), ctx).await?;
        }
        Ok(())
    }
}

/// 给测验打上"需要重新总结"的时间戳
async fn request_summary(store: Arc<dyn DocumentStore>, ctx: TriggerCtx) -> AppResult<()> {
    let updates = FieldUpdates::new().server_timestamp(quiz_fields::SUMMARY_SHOULD_RUN_DATE);
    match store.update(&ctx.quiz_path(), updates).await {
        Ok(()) => {
            debug!("{} 已请求重新总结", ctx);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            warn!("{} 测验已不存在，跳过总结", ctx);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn owned_str(doc: &Document, path: &str) -> Option<String> {
    field_str(doc, path).map(str::to_owned)
}

fn owned_value(doc: &Document, path: &str) -> Option<JsonValue> {
    field_value(doc, path).cloned()
}
