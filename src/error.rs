//! 应用程序错误类型
//!
//! 错误文本会被原样写入文档的错误字段（例如 `autoGradeError`），
//! 因此 `Display` 输出使用面向教师的英文描述。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文档 / 文件存储错误
    #[error(transparent)]
    Store(#[from] StoreError),
    /// 模型调用错误
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// 业务前置条件错误
    #[error(transparent)]
    Business(#[from] BusinessError),
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 存储相关错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 文档或文件不存在
    #[error("Document not found: {path}")]
    NotFound { path: String },
    /// 路径格式不合法（文档路径必须是偶数段，集合路径必须是奇数段）
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    /// 文档内容无法解码为目标类型
    #[error("Failed to decode document {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 写入值无法编码
    #[error("Failed to encode value for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 文件读写失败
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 模型服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败（网络、鉴权、限流等）
    #[error("Model API call failed (model: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 返回的 choices 为空
    #[error("Model returned no choices (model: {model})")]
    EmptyResponse { model: String },
    /// 返回的 message 没有内容
    #[error("Model returned empty content (model: {model})")]
    EmptyContent { model: String },
    /// 结构化输出不符合期望的结构
    #[error("Model output does not match schema '{schema}': {source}")]
    SchemaMismatch {
        schema: String,
        #[source]
        source: serde_json::Error,
    },
    /// 期望结构化输出却得到纯文本（或相反）
    #[error("Model returned {actual} output where {expected} was expected")]
    UnexpectedFormat {
        expected: &'static str,
        actual: &'static str,
    },
}

/// 业务前置条件错误，均在调用模型之前同步抛出
#[derive(Debug, Error)]
pub enum BusinessError {
    #[error("No answers found")]
    NoAnswers,
    #[error("The quiz does not have any questions yet.")]
    NoQuestions,
    #[error("The quiz does not have any responses yet.")]
    NoResponses,
    #[error("Quiz not found: {quiz_id}")]
    QuizNotFound { quiz_id: String },
    #[error("Response not found: {response_id}")]
    ResponseNotFound { response_id: String },
    #[error("Response {response_id} has no photo")]
    MissingPhoto { response_id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("Environment variable {var_name} has value '{value}' which is not a valid {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("Failed to parse TOML file {path}: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 命令行参数错误
    #[error("{message}")]
    InvalidArguments { message: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建模型 API 调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建文档不存在错误
    pub fn not_found(path: impl Into<String>) -> Self {
        AppError::Store(StoreError::NotFound { path: path.into() })
    }

    /// 创建路径非法错误
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Store(StoreError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        })
    }

    /// 创建文件读写错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Store(StoreError::Io {
            path: path.into(),
            source,
        })
    }

    /// 创建命令行参数错误
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidArguments {
            message: message.into(),
        })
    }

    /// 是否为"文档不存在"
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Store(StoreError::NotFound { .. }))
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_render_user_facing_text() {
        assert_eq!(AppError::from(BusinessError::NoAnswers).to_string(), "No answers found");
        assert_eq!(
            AppError::from(BusinessError::NoResponses).to_string(),
            "The quiz does not have any responses yet."
        );
        assert_eq!(
            AppError::from(BusinessError::NoQuestions).to_string(),
            "The quiz does not have any questions yet."
        );
    }

    #[test]
    fn not_found_is_detected() {
        assert!(AppError::not_found("quizzes/q1").is_not_found());
        assert!(!AppError::invalid_path("quizzes", "odd").is_not_found());
    }
}
