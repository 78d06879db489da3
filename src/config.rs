use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 模型配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 单次调用的输出 token 上限
    pub llm_max_tokens: u32,
    pub llm_temperature: Option<f32>,
    // --- 存储配置 ---
    /// 文档快照与图片文件的存放目录
    pub data_dir: PathBuf,
    /// 图片公开访问地址前缀，`{prefix}/{blob_path}` 即模型可读取的 URL
    pub blob_public_base_url: String,
    // --- 流程配置 ---
    /// "处理中"状态的新鲜度窗口（秒）
    pub processing_window_secs: u64,
    /// 学生姓名匹配的置信度下限（严格大于才采纳）
    pub match_confidence_floor: f64,
    /// 当前操作的教师 ID
    pub educator_user_id: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_max_tokens: 1000,
            llm_temperature: None,
            data_dir: PathBuf::from("quiz_data"),
            blob_public_base_url: "https://storage.googleapis.com/quiz-grader".to_string(),
            processing_window_secs: 30,
            match_confidence_floor: 0.8,
            educator_user_id: "local-educator".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载（未设置的项使用默认值）
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，再用环境变量覆盖
    ///
    /// 文件不存在时等同于 [`Config::from_env`]。
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let base = match config_file {
            Some(path) if path.exists() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    /// 只读取 TOML 文件
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    fn with_env_overrides(self) -> AppResult<Self> {
        Ok(Self {
            llm_api_key: env_string("LLM_API_KEY", self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL", self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME", self.llm_model_name),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS", self.llm_max_tokens)?,
            llm_temperature: match std::env::var("LLM_TEMPERATURE") {
                Ok(value) => Some(parse_value("LLM_TEMPERATURE", &value)?),
                Err(_) => self.llm_temperature,
            },
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(self.data_dir),
            blob_public_base_url: env_string("BLOB_PUBLIC_BASE_URL", self.blob_public_base_url),
            processing_window_secs: env_parse("PROCESSING_WINDOW_SECS", self.processing_window_secs)?,
            match_confidence_floor: env_parse("MATCH_CONFIDENCE_FLOOR", self.match_confidence_floor)?,
            educator_user_id: env_string("EDUCATOR_USER_ID", self.educator_user_id),
            verbose_logging: env_parse("VERBOSE_LOGGING", self.verbose_logging)?,
        })
    }

    pub fn processing_window(&self) -> Duration {
        Duration::from_secs(self.processing_window_secs)
    }

    /// 文档快照文件路径
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }

    /// 图片文件根目录
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

fn env_string(var_name: &str, default: String) -> String {
    std::env::var(var_name).unwrap_or(default)
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> AppResult<T> {
    match std::env::var(var_name) {
        Ok(value) => parse_value(var_name, &value),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(var_name: &str, value: &str) -> AppResult<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: std::any::type_name::<T>().to_string(),
        }
        .into()
    })
}
