//! 提交内容校验
//!
//! 纯函数，在任何网络调用之前执行。

use crate::config::{Config, ContentRequirement};
use crate::error::ValidationError;
use crate::models::{ContributionDraft, Language, Script};
use crate::services::script::{script_conformance, script_stats};

/// 校验规则
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationRules {
    pub requirement: ContentRequirement,
    pub script_threshold: f64,
    /// 本族文字答案至少需要的有效字符数
    pub min_countable_chars: usize,
}

impl ValidationRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            requirement: config.content_requirement,
            script_threshold: config.script_threshold,
            min_countable_chars: config.min_countable_chars,
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 校验一次提交
///
/// 检查顺序：内容是否为空 → 是否缺文字 → 文字长度 → 文字系统。
pub fn validate_contribution(
    draft: &ContributionDraft,
    language: Language,
    script: Script,
    rules: &ValidationRules,
) -> Result<(), ValidationError> {
    let text = draft.trimmed_text();

    if text.is_none() && !draft.has_audio() && !draft.has_image() {
        return Err(match rules.requirement {
            ContentRequirement::TextRequired => ValidationError::MissingText,
            ContentRequirement::AnyContent => ValidationError::EmptyContribution,
        });
    }

    let Some(text) = text else {
        return match rules.requirement {
            ContentRequirement::TextRequired => Err(ValidationError::MissingText),
            ContentRequirement::AnyContent => Ok(()),
        };
    };

    if script == Script::Native {
        let range = language.script_range();
        let stats = script_stats(text, &range);
        if stats.countable < rules.min_countable_chars {
            return Err(ValidationError::TooShort {
                min: rules.min_countable_chars,
                actual: stats.countable,
            });
        }
        if !script_conformance(text, &range, rules.script_threshold) {
            return Err(ValidationError::ScriptMismatch {
                language,
                ratio: stats.ratio().unwrap_or(0.0),
            });
        }
    }

    Ok(())
}
