//! 命令行命令

use std::path::PathBuf;

use crate::error::{AppError, AppResult};

pub const USAGE: &str = "\
用法: quiz_grader <命令> [参数]

命令:
  seed <toml 文件或目录>                     导入学生名册与测验
  upload <quizId> <图片路径>                 上传答卷照片并自动批改
  reparse <quizId> <responseId>             重新识别答卷
  regrade <quizId> <responseId>             重新评分
  assign <quizId> <responseId> [studentId]  手动指定学生（省略 studentId 表示撤销）
  resummarize <quizId>                      重新生成测验总结
  show <quizId>                             显示测验、答卷与总结
  delete-response <quizId> <responseId>     删除答卷及其照片";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Seed { path: PathBuf },
    Upload { quiz_id: String, photo: PathBuf },
    Reparse { quiz_id: String, response_id: String },
    Regrade { quiz_id: String, response_id: String },
    Assign {
        quiz_id: String,
        response_id: String,
        student_id: Option<String>,
    },
    Resummarize { quiz_id: String },
    Show { quiz_id: String },
    DeleteResponse { quiz_id: String, response_id: String },
}

impl Command {
    /// 解析命令行参数（不含程序名）
    pub fn parse<S: AsRef<str>>(args: &[S]) -> AppResult<Self> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let command = match args.as_slice() {
            ["seed", path] => Command::Seed { path: path.into() },
            ["upload", quiz_id, photo] => Command::Upload {
                quiz_id: quiz_id.to_string(),
                photo: photo.into(),
            },
            ["reparse", quiz_id, response_id] => Command::Reparse {
                quiz_id: quiz_id.to_string(),
                response_id: response_id.to_string(),
            },
            ["regrade", quiz_id, response_id] => Command::Regrade {
                quiz_id: quiz_id.to_string(),
                response_id: response_id.to_string(),
            },
            ["assign", quiz_id, response_id] => Command::Assign {
                quiz_id: quiz_id.to_string(),
                response_id: response_id.to_string(),
                student_id: None,
            },
            ["assign", quiz_id, response_id, student_id] => Command::Assign {
                quiz_id: quiz_id.to_string(),
                response_id: response_id.to_string(),
                student_id: Some(student_id.to_string()),
            },
            ["resummarize", quiz_id] => Command::Resummarize {
                quiz_id: quiz_id.to_string(),
            },
            ["show", quiz_id] => Command::Show {
                quiz_id: quiz_id.to_string(),
            },
            ["delete-response", quiz_id, response_id] => Command::DeleteResponse {
                quiz_id: quiz_id.to_string(),
                response_id: response_id.to_string(),
            },
            [] => return Err(AppError::invalid_arguments(USAGE)),
            [name, ..] => {
                return Err(AppError::invalid_arguments(format!(
                    "无法识别的命令或参数个数不对: {}\n\n{}",
                    name, USAGE
                )))
            }
        };
        Ok(command)
    }
}
