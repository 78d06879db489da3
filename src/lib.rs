//! # Quiz Grader
//!
//! 拍照上传纸质测验答卷，由模型识别、匹配学生、自动评分并汇总全班表现
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，层与层之间只通过文档字段通信：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有存储资源，只暴露能力
//! - `DocumentStore` - 文档读写 + 变更订阅（`MemoryStore` 为内存实现，可保存快照）
//! - `BlobStore` - 答卷照片存储
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 模型调用边界：文本/图片片段输入，结构化或纯文本输出
//! - `LlmClient` - OpenAI 兼容接口；`MockModelClient` - 脚本化回复
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `ResponseParser` / `StudentMatcher` / `AutoGrader` / `QuizSummarizer`
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 根据文档变化决定启动哪些阶段
//! - `ResponseTrigger` - 答卷更新触发器
//! - `QuizSummaryTrigger` - 测验总结触发器
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 订阅变更并执行触发结果
//! - `orchestrator/app` - 应用生命周期与命令
//!
//! ### 教师端视图（Stores）
//! - `stores/` - 学生、测验、答卷的实时视图与写操作
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod stores;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{LlmClient, MockModelClient, ModelClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{DocumentStore, MemoryStore};
pub use models::{Question, Quiz, QuizResponse, Student};
pub use orchestrator::{App, Command, TriggerDispatcher};
pub use workflow::{QuizSummaryTrigger, ResponseTrigger, TriggerCtx};
