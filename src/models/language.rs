use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// 语言枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// 桑塔利语
    Santali,
    /// 印地语
    Hindi,
    /// 孟加拉语
    Bengali,
    /// 奥里亚语
    Odia,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Santali,
        Language::Hindi,
        Language::Bengali,
        Language::Odia,
    ];

    /// 获取标准名称（同时也是文档库中的 `language` 字段值）
    pub fn name(self) -> &'static str {
        match self {
            Language::Santali => "Santali",
            Language::Hindi => "Hindi",
            Language::Bengali => "Bengali",
            Language::Odia => "Odia",
        }
    }

    /// 本族文字名称
    pub fn script_name(self) -> &'static str {
        match self {
            Language::Santali => "Ol Chiki",
            Language::Hindi => "Devanagari",
            Language::Bengali => "Bengali",
            Language::Odia => "Odia",
        }
    }

    /// 本族文字在提示词中的写法
    pub fn script_native_label(self) -> &'static str {
        match self {
            Language::Santali => "ᱚᱞ ᱪᱤᱠᱤ",
            Language::Hindi => "देवनागरी",
            Language::Bengali => "বাংলা লিপি",
            Language::Odia => "ଓଡ଼ିଆ ଲିପି",
        }
    }

    /// 本族文字对应的 Unicode 区块
    pub fn script_range(self) -> RangeInclusive<char> {
        match self {
            Language::Santali => '\u{1C50}'..='\u{1C7F}',
            Language::Hindi => '\u{0900}'..='\u{097F}',
            Language::Bengali => '\u{0980}'..='\u{09FF}',
            Language::Odia => '\u{0B00}'..='\u{0B7F}',
        }
    }

    /// 路径中使用的小写形式
    pub fn slug(self) -> &'static str {
        match self {
            Language::Santali => "santali",
            Language::Hindi => "hindi",
            Language::Bengali => "bengali",
            Language::Odia => "odia",
        }
    }

    /// 从名称解析（不区分大小写）
    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(s))
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("未知语言: {}", s))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 书写方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    /// 本族文字（如 Ol Chiki、孟加拉文）
    #[default]
    Native,
    /// 拉丁字母转写
    Latin,
}

impl Script {
    pub fn slug(self) -> &'static str {
        match self {
            Script::Native => "native",
            Script::Latin => "latin",
        }
    }
}

impl std::str::FromStr for Script {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Script::Native),
            "latin" => Ok(Script::Latin),
            other => Err(format!("未知书写方式: {}", other)),
        }
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// 输入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// 直接输入文字
    #[default]
    Text,
    /// 看印刷图片输入
    ImageToType,
    /// 看手写图片输入
    HandwritingToType,
}

impl InputMode {
    /// `raw/<mode>/` 目录名
    pub fn slug(self) -> &'static str {
        match self {
            InputMode::Text => "text",
            InputMode::ImageToType => "image_to_type",
            InputMode::HandwritingToType => "handwriting_to_type",
        }
    }

    /// 是否需要上传图片
    pub fn expects_image(self) -> bool {
        !matches!(self, InputMode::Text)
    }
}

impl std::str::FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "text" => Ok(InputMode::Text),
            "image_to_type" | "image" => Ok(InputMode::ImageToType),
            "handwriting_to_type" | "handwriting" => Ok(InputMode::HandwritingToType),
            other => Err(format!("未知输入方式: {}", other)),
        }
    }
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}
