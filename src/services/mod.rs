//! 业务能力层
//!
//! 每个服务只负责一种模型能力（识别、匹配、评分、总结），不关心流程。

pub mod grader;
pub mod prompts;
pub mod response_parser;
pub mod student_matcher;
pub mod summarizer;

pub use grader::AutoGrader;
pub use prompts::ResponseSummary;
pub use response_parser::{ResponseParser, PARSE_FAILURE_MESSAGE};
pub use student_matcher::{StudentMatch, StudentMatcher};
pub use summarizer::{QuizSummarizer, EMPTY_SUMMARY_FALLBACK};
