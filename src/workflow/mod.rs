//! 流程层：根据文档变化决定启动哪些阶段

pub mod outcome;
pub mod quiz_trigger;
pub mod response_trigger;
pub mod trigger_ctx;

pub use outcome::{FollowUp, TriggerOutcome};
pub use quiz_trigger::QuizSummaryTrigger;
pub use response_trigger::ResponseTrigger;
pub use trigger_ctx::TriggerCtx;
