//! 教师端数据视图
//!
//! 每个视图都是某个集合（或文档）的实时副本，写操作直接落到文档存储，
//! 除字段整理和上传占位外不含业务逻辑。

pub mod live;
pub mod quizzes;
pub mod response_view;
pub mod responses;
pub mod students;

pub use live::{Identified, LiveCollection, LiveDocument};
pub use quizzes::QuizStore;
pub use response_view::ResponseView;
pub use responses::{ResponseStore, UploadingResponse};
pub use students::StudentStore;
