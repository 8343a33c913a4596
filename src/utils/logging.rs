use tracing::info;
/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use tracing_subscriber::EnvFilter;

use crate::models::Language;

/// 初始化全局日志
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 debug 或 info。
/// 重复调用不会报错（测试中会多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(repo_id: &str, model_name: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 JanAI 数据采集启动");
    info!("📦 数据集仓库: {}", repo_id);
    info!("🤖 生成模型: {}", model_name);
    info!("{}", "=".repeat(60));
}

/// 记录批量生成开始信息
///
/// # 参数
/// - `language`: 目标语言
/// - `count`: 计划生成数量
pub fn log_batch_start(language: Language, count: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始批量生成题目: {} × {}", language, count);
    info!("{}", "=".repeat(60));
}

/// 记录单道题目进度
pub fn log_batch_progress(index: usize, total: usize, text: &str) {
    info!("[{}/{}] ✓ {}", index, total, truncate_text(text, 60));
}

/// 记录批量生成完成信息
///
/// # 参数
/// - `language`: 目标语言
/// - `stored`: 成功写入题库的数量
/// - `fallbacks`: 使用兜底题目的数量
/// - `total`: 计划数量
pub fn log_batch_complete(language: Language, stored: usize, fallbacks: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ {} 批量生成完成: 写入 {}/{}", language, stored, total);
    if fallbacks > 0 {
        info!("⚠️ {} 道重试耗尽，兜底题目未写入题库", fallbacks);
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
