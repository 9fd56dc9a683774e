use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use wirebox::bootstrap::{self, EmailService, Storage, UserRepository, UserService};
use wirebox::config::{AppConfig, ConfigLoader};
use wirebox::logging::{init_logging, LoggingConfig};
use wirebox::ServiceContainer;

#[derive(Parser, Debug)]
#[command(name = "wirebox", version, about = "Build and inspect the application's service container")]
struct Cli {
    /// 配置文件路径，默认 ~/.config/wirebox/config.toml
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志级别
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出所有注册键
    Types,
    /// 解析所有边界服务并输出统计
    Check {
        /// 以 JSON 输出统计
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_file(path.clone()),
        None => ConfigLoader::new(),
    };
    let mut config = loader
        .load_config()
        .with_context(|| format!("loading configuration from {}", loader.config_path().display()))?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.to_ascii_lowercase();
    }

    init_logging(LoggingConfig::from_settings(&config.logging)?)?;

    let container = bootstrap::init_container(&config).context("building service container")?;
    let outcome = run(&cli.command, &container);
    container.close();
    outcome
}

fn run(command: &Command, container: &ServiceContainer) -> anyhow::Result<()> {
    match command {
        Command::Types => {
            for name in container.registered_types() {
                println!("{}", name);
            }
        }
        Command::Check { json } => {
            container.resolve::<AppConfig>()?;
            container.resolve::<dyn EmailService>()?;
            container.resolve::<dyn Storage>()?;
            container.resolve::<dyn UserRepository>()?;
            container.resolve::<UserService>()?;

            let stats = container.stats();
            if *json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("all services resolved");
                println!("{}", stats.performance_summary());
            }
        }
    }
    Ok(())
}
