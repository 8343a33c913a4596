use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Language;

/// 题库中的一道题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 文档ID（由文档库分配）
    pub id: String,
    pub language: Language,
    #[serde(default)]
    pub topic: String,
    pub text: String,
    /// 是否已停用；抽题时只考虑 `used == false` 的题目
    #[serde(default)]
    pub used: bool,
    /// 服务端写入时间
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview = crate::utils::logging::truncate_text(&self.text, 80);
        if self.topic.is_empty() {
            write!(f, "[{}] {}", self.language, preview)
        } else {
            write!(f, "[{} · {}] {}", self.language, self.topic, preview)
        }
    }
}

/// 待写入题库的新题目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub language: Language,
    pub topic: String,
    pub text: String,
}

/// LLM 生成的题目
///
/// 统一使用 `question` 字段，旧版提示词中的 `q` 作为别名接受。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub category: String,
    #[serde(alias = "q")]
    pub question: String,
}

impl GeneratedQuestion {
    pub fn into_new_question(self, language: Language) -> NewQuestion {
        NewQuestion {
            language,
            topic: self.category,
            text: self.question,
        }
    }
}
