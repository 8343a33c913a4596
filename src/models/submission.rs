use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{InputMode, Language, Script};

/// 匿名贡献者的占位名
pub const ANONYMOUS_USER: &str = "anonymous";

/// 贡献者填写的内容（尚未分配ID）
#[derive(Debug, Clone, Default)]
pub struct ContributionDraft {
    /// 文字答案
    pub answer_text: Option<String>,
    /// 录音（WAV）
    pub audio: Option<Vec<u8>>,
    /// 图片（PNG/JPEG）
    pub image: Option<Vec<u8>>,
}

impl ContributionDraft {
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            answer_text: Some(answer.into()),
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// 去掉首尾空白后的文字，空文字视为没有
    pub fn trimmed_text(&self) -> Option<&str> {
        self.answer_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn has_audio(&self) -> bool {
        self.audio.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn has_image(&self) -> bool {
        self.image.as_ref().is_some_and(|i| !i.is_empty())
    }
}

/// 一次提交（创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user: String,
    pub language: Language,
    pub script: Script,
    pub input_mode: InputMode,
    /// 当时展示给贡献者的题目，没有题目时为空
    #[serde(default)]
    pub question: String,
    #[serde(rename = "answer", skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    pub has_audio: bool,
    pub has_image: bool,
    pub timestamp: DateTime<Utc>,
}

impl Submission {
    /// 元数据 JSON（UTF-8，保留非 ASCII 字符）
    pub fn to_metadata_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// 扁平化为账本行
    pub fn ledger_row(&self) -> LedgerRow {
        LedgerRow {
            id: self.id.to_string(),
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            user: self.user.clone(),
            language: self.language.name().to_string(),
            script: self.script.slug().to_string(),
            input_mode: self.input_mode.slug().to_string(),
            question: self.question.clone(),
            answer: self.answer_text.clone().unwrap_or_default(),
            has_audio: self.has_audio.to_string(),
            has_image: self.has_image.to_string(),
        }
    }
}

/// 账本（CSV）中的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub id: String,
    pub timestamp: String,
    pub user: String,
    pub language: String,
    pub script: String,
    pub input_mode: String,
    pub question: String,
    pub answer: String,
    pub has_audio: String,
    pub has_image: String,
}

impl LedgerRow {
    /// 新建账本时使用的表头
    pub const COLUMNS: [&'static str; 10] = [
        "id",
        "timestamp",
        "user",
        "language",
        "script",
        "input_mode",
        "question",
        "answer",
        "has_audio",
        "has_image",
    ];

    /// 按列名取值，未知列返回空字符串
    pub fn field(&self, column: &str) -> &str {
        match column {
            "id" => &self.id,
            "timestamp" => &self.timestamp,
            "user" => &self.user,
            "language" => &self.language,
            "script" => &self.script,
            "input_mode" => &self.input_mode,
            "question" => &self.question,
            "answer" => &self.answer,
            "has_audio" => &self.has_audio,
            "has_image" => &self.has_image,
            _ => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Submission {
        Submission {
            id: Uuid::nil(),
            user: ANONYMOUS_USER.to_string(),
            language: Language::Hindi,
            script: Script::Native,
            input_mode: InputMode::Text,
            question: "आप कहाँ रहते हैं?".to_string(),
            answer_text: Some("नमस्ते".to_string()),
            has_audio: true,
            has_image: false,
            timestamp: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_metadata_json_keeps_unicode_and_flags() {
        let bytes = sample().to_metadata_json().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("नमस्ते"));

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["has_audio"], true);
        assert_eq!(value["has_image"], false);
        assert_eq!(value["language"], "Hindi");
        assert_eq!(value["input_mode"], "text");
    }

    #[test]
    fn test_ledger_row_projection() {
        let row = sample().ledger_row();
        assert_eq!(row.field("id"), Uuid::nil().to_string());
        assert_eq!(row.field("timestamp"), "2026-01-02T03:04:05.000Z");
        assert_eq!(row.field("has_audio"), "true");
        assert_eq!(row.field("unknown"), "");
    }

    #[test]
    fn test_draft_treats_blank_text_as_missing() {
        let draft = ContributionDraft::text("   \n");
        assert_eq!(draft.trimmed_text(), None);
        assert!(!draft.has_audio());
        assert!(ContributionDraft::default().with_audio(vec![1]).has_audio());
    }
}
