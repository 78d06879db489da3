//! 学生匹配服务 - 业务能力层
//!
//! 只负责"把识别出的姓名对应到名册中的学生"能力

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{ModelClient, OutputFormat, ContentPart};
use crate::models::Student;
use crate::services::prompts::{match_prompt, student_match_schema, STUDENT_MATCH_SCHEMA_NAME};

/// 模型给出的匹配建议
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMatch {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl StudentMatch {
    pub fn none() -> Self {
        Self {
            student_id: None,
            confidence: 0.0,
        }
    }
}

/// 置信度下限的最小值，配置更低时按此值处理
pub const MIN_CONFIDENCE_FLOOR: f64 = 0.8;

/// 学生匹配服务
pub struct StudentMatcher {
    client: Arc<dyn ModelClient>,
    confidence_floor: f64,
}

impl StudentMatcher {
    pub fn new(client: Arc<dyn ModelClient>, confidence_floor: f64) -> Self {
        if confidence_floor < MIN_CONFIDENCE_FLOOR {
            warn!(
                "⚠️ 匹配置信度下限 {} 低于 {}，按 {} 处理",
                confidence_floor, MIN_CONFIDENCE_FLOOR, MIN_CONFIDENCE_FLOOR
            );
        }
        let confidence_floor = confidence_floor.max(MIN_CONFIDENCE_FLOOR);
        Self {
            client,
            confidence_floor,
        }
    }

    /// 匹配学生
    ///
    /// 只有置信度严格大于下限、且 ID 确实在名册中时才返回 `student_id`；
    /// 名册为空时不调用模型，调用失败按"无匹配"处理。
    pub async fn match_name(&self, parsed_name: &str, roster: &[Student]) -> StudentMatch {
        if roster.is_empty() || parsed_name.trim().is_empty() {
            debug!("名册为空或姓名为空，跳过匹配");
            return StudentMatch::none();
        }

        let parts = vec![ContentPart::text(match_prompt(
            parsed_name,
            roster,
            self.confidence_floor,
        ))];
        let format = OutputFormat::json_schema(STUDENT_MATCH_SCHEMA_NAME, student_match_schema());

        let suggestion = match self.client.complete(parts, format).await {
            Ok(completion) => completion.into_structured::<StudentMatch>(STUDENT_MATCH_SCHEMA_NAME),
            Err(e) => Err(e),
        };

        match suggestion {
            Ok(suggestion) => self.accept(suggestion, roster),
            Err(e) => {
                warn!("学生姓名匹配失败: {}", e);
                StudentMatch::none()
            }
        }
    }

    fn accept(&self, suggestion: StudentMatch, roster: &[Student]) -> StudentMatch {
        let candidate = suggestion
            .student_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        let Some(candidate) = candidate else {
            return StudentMatch {
                student_id: None,
                confidence: suggestion.confidence,
            };
        };

        if suggestion.confidence <= self.confidence_floor {
            info!(
                "匹配置信度 {} 未超过下限 {}，不采纳 {}",
                suggestion.confidence, self.confidence_floor, candidate
            );
            return StudentMatch {
                student_id: None,
                confidence: suggestion.confidence,
            };
        }

        if !roster.iter().any(|s| s.id == candidate) {
            warn!("模型返回的学生 ID 不在名册中: {}", candidate);
            return StudentMatch {
                student_id: None,
                confidence: suggestion.confidence,
            };
        }

        StudentMatch {
            student_id: Some(candidate.to_string()),
            confidence: suggestion.confidence,
        }
    }
}
