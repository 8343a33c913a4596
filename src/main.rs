use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use janai_collect::utils::logging;
use janai_collect::{App, Command, Config};

/// JanAI 语言数据采集
#[derive(Debug, Parser)]
#[command(name = "janai", version, about)]
struct Cli {
    /// TOML 密钥文件，不指定时只读取环境变量
    #[arg(long, global = true, env = "JANAI_SECRETS")]
    config: Option<PathBuf>,

    /// 显示详细日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);
    logging::log_startup(&config.hf_repo_id, &config.llm_model_name);

    // 初始化并运行应用
    App::initialize(config)?.run(cli.command).await?;

    Ok(())
}
