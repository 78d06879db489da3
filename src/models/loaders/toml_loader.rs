//! 从 TOML 文件导入学生名册与测验
//!
//! ```toml
//! [[students]]
//! name = "Ada Lovelace"
//!
//! [[quizzes]]
//! id = "fractions"
//! name = "Fractions"
//!
//! [[quizzes.questions]]
//! id = "q1"
//! question = "1/2 + 1/2 = ?"
//! answer = "1"
//! points = 10
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::quiz::Question;

/// 一个导入文件的内容
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub students: Vec<SeedStudent>,
    #[serde(default)]
    pub quizzes: Vec<SeedQuiz>,
    #[serde(skip)]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStudent {
    /// 指定 ID 时覆盖写入，否则自动生成
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedQuiz {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// 加载单个导入文件
pub async fn load_seed_file(toml_file_path: &Path) -> Result<SeedFile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut seed: SeedFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    seed.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(seed)
}

/// 加载路径下的所有导入文件
///
/// 路径是文件时只加载该文件；是目录时加载其中所有 `.toml` 文件（按文件名排序），
/// 单个文件解析失败只记录警告。
pub async fn load_seed_files(path: &Path) -> Result<Vec<SeedFile>> {
    if !path.exists() {
        anyhow::bail!("路径不存在: {}", path.display());
    }

    if path.is_file() {
        return Ok(vec![load_seed_file(path).await?]);
    }

    let mut toml_files: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        if entry_path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(entry_path);
        }
    }
    toml_files.sort();

    let mut seeds = Vec::new();
    for file in toml_files {
        tracing::info!(
            "正在加载: {}",
            file.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_seed_file(&file).await {
            Ok(seed) => {
                tracing::info!(
                    "成功加载 {} 个学生, {} 个测验",
                    seed.students.len(),
                    seed.quizzes.len()
                );
                seeds.push(seed);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", file.display(), e);
            }
        }
    }

    Ok(seeds)
}
