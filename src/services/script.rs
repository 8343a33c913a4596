//! 文字系统校验
//!
//! 判断一段文字是否主要由目标文字（某个 Unicode 区块）组成。

use std::ops::RangeInclusive;

/// 默认占比阈值
pub const DEFAULT_SCRIPT_THRESHOLD: f64 = 0.8;

/// 文字统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptStats {
    /// 参与统计的字符数（不含空白、标点、数字）
    pub countable: usize,
    /// 其中落在目标区块内的字符数
    pub in_range: usize,
}

impl ScriptStats {
    /// 目标文字占比，没有可统计字符时为 None
    pub fn ratio(&self) -> Option<f64> {
        (self.countable > 0).then(|| self.in_range as f64 / self.countable as f64)
    }
}

/// 统计目标区块字符
pub fn script_stats(text: &str, range: &RangeInclusive<char>) -> ScriptStats {
    text.chars()
        .filter(|c| is_countable(*c))
        .fold(ScriptStats::default(), |mut stats, c| {
            stats.countable += 1;
            if range.contains(&c) {
                stats.in_range += 1;
            }
            stats
        })
}

/// 文字是否符合目标文字系统
///
/// 占比 `>= threshold` 即通过；没有可统计字符时视为通过。
pub fn script_conformance(text: &str, range: &RangeInclusive<char>, threshold: f64) -> bool {
    match script_stats(text, range).ratio() {
        Some(ratio) => ratio >= threshold,
        None => true,
    }
}

fn is_countable(c: char) -> bool {
    !c.is_whitespace() && !c.is_numeric() && !is_punctuation(c)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c,
            '\u{00A1}'..='\u{00BF}'   // Latin-1 标点与符号
            | '\u{0964}'..='\u{0965}' // 梵文系 danda
            | '\u{1C7E}'..='\u{1C7F}' // Ol Chiki 标点
            | '\u{2000}'..='\u{206F}' // 通用标点
            | '\u{3000}'..='\u{303F}' // CJK 标点
            | '\u{FF01}'..='\u{FF0F}' // 全角标点
        )
}
