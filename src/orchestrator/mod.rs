//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `dispatcher` - 触发器调度器
//! - 订阅文档变更，按路径路由到触发器
//! - 先写回字段，再并发执行后续任务
//! - 单个任务失败不影响其它任务
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、执行命令、保存快照）
//! - 持有文档存储、文件存储与调度器
//!
//! ### `command` - 命令行命令
//!
//! ## 层次关系
//!
//! ```text
//! app (执行命令，写入文档)
//!     ↓
//! dispatcher (订阅变更，执行触发结果)
//!     ↓
//! workflow::ResponseTrigger / QuizSummaryTrigger (决定做什么)
//!     ↓
//! services (能力层：识别 / 匹配 / 评分 / 总结)
//!     ↓
//! infrastructure (基础设施：文档存储、文件存储)
//! ```

pub mod app;
pub mod command;
pub mod dispatcher;

pub use app::App;
pub use command::{Command, USAGE};
pub use dispatcher::TriggerDispatcher;
