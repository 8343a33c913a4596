//! 从模型输出中提取 JSON 对象
//!
//! 模型经常在 JSON 外面包一层说明文字或 ``` 代码块。

use std::sync::OnceLock;

use regex::Regex;

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// 提取第一个完整的 `{...}` 对象
///
/// 有代码块时只在第一个包含 `{` 的代码块内查找；括号匹配会跳过字符串里的括号。
/// 括号不配对时截到最后一个 `}`；完全没有 `{` 时返回去掉首尾空白的原文，
/// 交给后续 JSON 解析报错。
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    let region = fence_regex()
        .and_then(|re| {
            re.captures_iter(trimmed)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .find(|body| body.contains('{'))
        })
        .unwrap_or(trimmed);

    let Some(start) = region.find('{') else {
        return trimmed;
    };

    if let Some(end) = matching_brace(region, start) {
        return &region[start..=end];
    }

    match region.rfind('}') {
        Some(end) if end > start => &region[start..=end],
        _ => trimmed,
    }
}

/// 依次返回文本中每个 `{` 开始的完整对象（按出现顺序，含嵌套对象）
///
/// `extract_json` 取到的第一个对象不是合法 JSON 时（例如说明文字里的 `{format}`），
/// 调用方用它继续往后找。
pub fn object_candidates(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(move |(start, _)| matching_brace(text, start).map(|end| &text[start..=end]))
}

/// 返回与 `start` 处 `{` 配对的 `}` 的字节位置
fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}
