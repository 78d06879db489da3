//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：加载文档快照、创建模型客户端与文件存储
//! 2. **组装触发器**：把服务注入触发器，再交给调度器
//! 3. **执行命令**：通过教师端视图写入文档，随后驱动调度器直到流水线静止
//! 4. **持久化**：命令结束后保存文档快照，输出统计

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::clients::{LlmClient, ModelClient};
use crate::config::Config;
use crate::error::{AppError, BusinessError};
use crate::infrastructure::{get_as, BlobStore, DocumentStore, FsBlobStore, MemoryStore};
use crate::models::paths::quiz_doc_path;
use crate::models::{load_seed_files, Quiz, QuizResponse};
use crate::orchestrator::command::Command;
use crate::orchestrator::dispatcher::TriggerDispatcher;
use crate::services::{AutoGrader, QuizSummarizer, ResponseParser, StudentMatcher};
use crate::stores::{QuizStore, ResponseStore, ResponseView, StudentStore};
use crate::utils::date::{format_date, DateFormat};
use crate::utils::logging::{log_startup, print_final_stats, RunStats};
use crate::workflow::{QuizSummaryTrigger, ResponseTrigger};

/// 应用主结构
pub struct App {
    config: Config,
    store: Arc<MemoryStore>,
    blobs: Arc<dyn BlobStore>,
    dispatcher: TriggerDispatcher,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let snapshot_path = config.snapshot_path();
        let store = MemoryStore::load_snapshot(&snapshot_path)
            .await
            .with_context(|| format!("无法加载文档快照: {}", snapshot_path.display()))?;
        info!("✓ 已加载 {} 个文档", store.len());

        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(
            config.blob_dir(),
            config.blob_public_base_url.clone(),
        ));
        let client: Arc<dyn ModelClient> = Arc::new(LlmClient::new(&config));

        Ok(Self::with_components(config, Arc::new(store), blobs, client))
    }

    /// 使用给定组件组装应用
    pub fn with_components(
        config: Config,
        store: Arc<MemoryStore>,
        blobs: Arc<dyn BlobStore>,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        let doc_store: Arc<dyn DocumentStore> = store.clone();

        let response_trigger = ResponseTrigger::new(
            doc_store.clone(),
            blobs.clone(),
            Arc::new(ResponseParser::new(client.clone())),
            Arc::new(StudentMatcher::new(
                client.clone(),
                config.match_confidence_floor,
            )),
            Arc::new(AutoGrader::new(client.clone())),
        );
        let quiz_trigger =
            QuizSummaryTrigger::new(doc_store.clone(), Arc::new(QuizSummarizer::new(client)));
        let dispatcher = TriggerDispatcher::new(doc_store, response_trigger, quiz_trigger);

        Self {
            config,
            store,
            blobs,
            dispatcher,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    /// 执行命令、保存快照并输出统计
    pub async fn run(&mut self, command: Command) -> Result<()> {
        let stats = self.execute(command).await?;

        let snapshot_path = self.config.snapshot_path();
        self.store
            .save_snapshot(&snapshot_path)
            .await
            .with_context(|| format!("无法保存文档快照: {}", snapshot_path.display()))?;

        print_final_stats(&stats, &snapshot_path);
        Ok(())
    }

    /// 执行命令并驱动流水线直到静止
    pub async fn execute(&mut self, command: Command) -> Result<RunStats> {
        let educator = self.config.educator_user_id.clone();
        let store = self.store();

        match command {
            Command::Seed { path } => {
                let seeds = load_seed_files(&path).await?;
                let students = StudentStore::open(store.clone(), educator.as_str()).await?;
                let quizzes = QuizStore::open(store.clone(), educator.as_str()).await?;

                for seed in &seeds {
                    for student in &seed.students {
                        match &student.id {
                            Some(id) => students.put(id, &student.name, &student.notes).await?,
                            None => {
                                students.add(&student.name, &student.notes).await?;
                            }
                        }
                    }
                    for quiz in &seed.quizzes {
                        match &quiz.id {
                            Some(id) => quizzes.put(id, &quiz.name, &quiz.questions).await?,
                            None => {
                                let id = quizzes.add(&quiz.name).await?;
                                quizzes.update_questions(&id, &quiz.questions).await?;
                            }
                        }
                    }
                }
                info!("✓ 导入完成: {} 个文件", seeds.len());
            }

            Command::Upload { quiz_id, photo } => {
                self.require_quiz(&quiz_id).await?;
                let bytes = tokio::fs::read(&photo)
                    .await
                    .with_context(|| format!("无法读取图片: {}", photo.display()))?;
                let responses = ResponseStore::open(store, self.blobs.clone(), quiz_id.as_str()).await?;
                let response_id = responses.upload(bytes).await?;
                info!("✓ 答卷 ID: {}", response_id);
            }

            Command::Reparse {
                quiz_id,
                response_id,
            } => {
                let view = self.open_view(&quiz_id, &response_id).await?;
                let has_photo = view
                    .response()
                    .and_then(|r| r.photo_capture_path.as_deref())
                    .is_some_and(|p| !p.trim().is_empty());
                if !has_photo {
                    return Err(BusinessError::MissingPhoto { response_id }.into());
                }
                view.re_parse().await?;
            }

            Command::Regrade {
                quiz_id,
                response_id,
            } => {
                self.open_view(&quiz_id, &response_id).await?.regrade().await?;
            }

            Command::Assign {
                quiz_id,
                response_id,
                student_id,
            } => {
                if let Some(student_id) = &student_id {
                    let students = StudentStore::open(store, educator.as_str()).await?;
                    if students.get(student_id).is_none() {
                        warn!("⚠️ 学生 {} 不在名册中", student_id);
                    }
                }
                self.open_view(&quiz_id, &response_id)
                    .await?
                    .select_student(student_id.as_deref())
                    .await?;
            }

            Command::Resummarize { quiz_id } => {
                self.require_quiz(&quiz_id).await?;
                QuizStore::open(store, educator.as_str())
                    .await?
                    .resummarize(&quiz_id)
                    .await?;
            }

            Command::Show { quiz_id } => {
                println!("{}", self.report(&quiz_id).await?);
            }

            Command::DeleteResponse {
                quiz_id,
                response_id,
            } => {
                let responses = ResponseStore::open(store, self.blobs.clone(), quiz_id.as_str()).await?;
                if responses.get(&response_id).await?.is_none() {
                    return Err(BusinessError::ResponseNotFound { response_id }.into());
                }
                responses.delete(&response_id).await?;
                info!("🗑️ 已删除答卷 {}", response_id);
            }
        }

        Ok(self.dispatcher.run_until_idle().await)
    }

    async fn require_quiz(&self, quiz_id: &str) -> Result<Quiz, AppError> {
        get_as::<Quiz>(self.store.as_ref(), &quiz_doc_path(quiz_id))
            .await?
            .ok_or_else(|| {
                BusinessError::QuizNotFound {
                    quiz_id: quiz_id.to_string(),
                }
                .into()
            })
    }

    async fn open_view(&self, quiz_id: &str, response_id: &str) -> Result<ResponseView, AppError> {
        let view = ResponseView::open(
            self.store(),
            quiz_id,
            response_id,
            self.config.processing_window(),
        )
        .await?;
        if view.response().is_none() {
            return Err(BusinessError::ResponseNotFound {
                response_id: response_id.to_string(),
            }
            .into());
        }
        Ok(view)
    }

    /// 生成测验报告文本
    pub async fn report(&self, quiz_id: &str) -> Result<String> {
        let quiz = self.require_quiz(quiz_id).await?;
        let students = StudentStore::open(self.store(), quiz.educator_user_id.as_str()).await?;
        let responses = ResponseStore::open(self.store(), self.blobs.clone(), quiz_id).await?;

        let mut lines = Vec::new();
        let created = quiz
            .created_at
            .map(|d| format_date(d, DateFormat::Long))
            .unwrap_or_default();
        lines.push(format!("测验: {} ({}) {}", quiz.name, quiz.id, created));
        lines.push(format!(
            "题目: {} 道，满分 {}",
            quiz.questions.len(),
            quiz.total_points()
        ));
        if let Some(average) = quiz.average_score {
            lines.push(format!("平均得分率: {:.1}%", average * 100.0));
        }
        if let Some(summary) = &quiz.summary {
            lines.push(format!("总结:\n{}", summary));
        }

        lines.push(format!("答卷: {} 份", responses.responses().len()));
        for response in responses.responses() {
            lines.push(describe_response(response, &students));
        }
        Ok(lines.join("\n"))
    }
}

fn describe_response(response: &QuizResponse, students: &StudentStore) -> String {
    let date = response
        .create_date
        .map(|d| format_date(d, DateFormat::MonthDay))
        .unwrap_or_else(|| "-".to_string());

    let student = match response.student_id.as_deref() {
        Some(id) => match students.get(id) {
            Some(student) => format!("{} ({})", student.name, id),
            None => id.to_string(),
        },
        None => response
            .parsed_student_name()
            .map(|name| format!("未匹配: {}", name))
            .unwrap_or_else(|| "未知".to_string()),
    };

    let mut line = format!("- {} [{}] 学生: {}", response.id, date, student);
    if let Some(grade) = &response.auto_grade_results {
        line.push_str(&format!(
            " | 得分 {}/{}",
            grade.total_points_earned, grade.total_possible_points
        ));
    }
    if let Some(error) = &response.photo_capture_parse_error {
        line.push_str(&format!(" | 识别错误: {}", error));
    }
    if let Some(error) = &response.auto_grade_error {
        line.push_str(&format!(" | 评分错误: {}", error));
    }
    line
}
