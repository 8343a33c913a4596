//! 会话上下文
//!
//! 封装"谁在用哪种语言、哪种输入方式回答哪道题"这一信息。
//! 每次交互显式传入，不使用全局状态。

use std::fmt::Display;

use uuid::Uuid;

use crate::models::{InputMode, Language, Question, Script, ANONYMOUS_USER};

/// 会话上下文
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCtx {
    /// 贡献者标识
    pub user: String,

    pub language: Language,

    pub script: Script,

    pub input_mode: InputMode,

    /// 当前展示的题目，题库为空时为 None
    pub current_question: Option<Question>,

    /// 上一次成功提交的 ID
    pub last_submission: Option<Uuid>,
}

impl SessionCtx {
    /// 创建新的会话上下文
    pub fn new(user: impl Into<String>, language: Language, script: Script, input_mode: InputMode) -> Self {
        let user = user.into();
        let user = if user.trim().is_empty() {
            ANONYMOUS_USER.to_string()
        } else {
            user.trim().to_string()
        };

        Self {
            user,
            language,
            script,
            input_mode,
            current_question: None,
            last_submission: None,
        }
    }

    /// 当前题目文本，没有题目时为空串
    pub fn question_text(&self) -> &str {
        self.current_question
            .as_ref()
            .map(|q| q.text.as_str())
            .unwrap_or("")
    }
}

impl Display for SessionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[用户 {} 语言#{} 文字#{} 输入#{}]",
            self.user,
            self.language,
            self.script,
            self.input_mode.slug()
        )
    }
}
