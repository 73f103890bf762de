use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use mlip_active::{wait_for_shutdown_signal, Application};
use mlip_config::{AppConfig, LogLevel, OutputFormat};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("mlip-active")
        .version("1.0.0")
        .about("机器学习势函数主动学习工作流")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (默认查找 config/mlip.toml, mlip.toml)"),
        )
        .arg(
            Arg::new("work-dir")
                .short('w')
                .long("work-dir")
                .value_name("DIR")
                .help("工作目录，覆盖配置中的 run.work_dir"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("打印合并后的配置并退出")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");

    // 加载配置
    let mut config = AppConfig::load(config_path.map(String::as_str)).with_context(|| {
        format!(
            "加载配置失败: {}",
            config_path.map_or("<默认>", String::as_str)
        )
    })?;
    if let Some(work_dir) = matches.get_one::<String>("work-dir") {
        config = config.with_work_dir(work_dir);
    }

    if matches.get_flag("dump-config") {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    // 命令行参数优先于配置文件
    let log_level = match matches.get_one::<String>("log-level") {
        Some(level) => level.parse::<LogLevel>().map_err(anyhow::Error::msg)?,
        None => config.logging.level,
    };
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format.parse::<OutputFormat>().map_err(anyhow::Error::msg)?,
        None => config.logging.format,
    };

    // 初始化日志系统
    init_logging(log_level, log_format)?;

    info!("启动主动学习工作流");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let app = Application::new(config);
    let shutdown_manager = app.shutdown_manager();

    // 收到信号后只停止等待，不终止已提交的作业
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("收到关闭信号，作业池将在下一次轮询前停止");
        shutdown_manager.shutdown();
    });

    match app.run().await {
        Ok(outcome) => {
            info!("主动学习工作流已退出: {outcome:?}");
            Ok(())
        }
        Err(e) => {
            error!("主动学习工作流失败: {e:#}");
            Err(e)
        }
    }
}

/// 初始化日志系统
fn init_logging(log_level: LogLevel, log_format: OutputFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}
