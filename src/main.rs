use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use habits_core::{logging::init_logging, AppConfig, LogLevel, OutputFormat};
use tokio::signal;
use tracing::{error, info, warn};

mod app;
mod shutdown;

use app::Application;
use shutdown::ShutdownManager;

/// 习惯追踪服务
#[derive(Parser, Debug)]
#[command(name = "habits")]
#[command(version)]
#[command(about = "习惯追踪服务 - API、提醒节拍器和管理命令")]
struct Cli {
    /// 配置文件路径，未指定时按默认路径查找
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行API服务器和提醒节拍器
    Serve,
    /// 用户管理
    User(UserCommands),
    /// 为用户签发访问令牌
    Token {
        #[arg(long)]
        email: String,
    },
}

#[derive(Args, Debug)]
struct UserCommands {
    #[command(subcommand)]
    action: UserActions,
}

#[derive(Subcommand, Debug)]
enum UserActions {
    /// 创建用户
    Create {
        #[arg(long)]
        email: String,
        /// Telegram 聊天ID
        #[arg(long)]
        chat_id: Option<String>,
    },
    /// 设置或清除用户的 Telegram 聊天ID
    SetChat {
        #[arg(long)]
        email: String,
        #[arg(long)]
        chat_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    init_logging(&config.logging)?;

    let app = Application::new(config).await?;

    match cli.command {
        Commands::Serve => serve(app).await,
        Commands::User(UserCommands { action }) => {
            let user = match action {
                UserActions::Create { email, chat_id } => {
                    app.create_user(&email, chat_id.as_deref()).await
                }
                UserActions::SetChat { email, chat_id } => {
                    app.set_chat(&email, chat_id.as_deref()).await
                }
            };
            let result = user.map(|user| {
                println!(
                    "{}\t{}\t{}",
                    user.id,
                    user.email,
                    user.chat_id.as_deref().unwrap_or("-")
                );
            });
            app.close().await;
            result
        }
        Commands::Token { email } => {
            let result = app.issue_token(&email).await.map(|token| println!("{token}"));
            app.close().await;
            result
        }
    }
}

async fn serve(app: Application) -> Result<()> {
    info!("启动习惯追踪服务");

    let shutdown_manager = ShutdownManager::new();
    let app = Arc::new(app);

    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);

        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 组件启动失败时任务会提前结束
    let finished_early = tokio::select! {
        _ = wait_for_shutdown_signal() => None,
        result = &mut app_handle => Some(result),
    };

    let outcome = match finished_early {
        Some(result) => Ok(result),
        None => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;
            tokio::time::timeout(Duration::from_secs(30), app_handle).await
        }
    };

    let result = match outcome {
        Ok(Ok(Ok(()))) => {
            info!("应用已优雅关闭");
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            error!("应用运行失败: {e:#}");
            Err(e)
        }
        Ok(Err(e)) => {
            error!("应用关闭时发生错误: {e}");
            Ok(())
        }
        Err(_) => {
            warn!("应用关闭超时，强制退出");
            Ok(())
        }
    };

    app.close().await;
    info!("习惯追踪服务已退出");
    result
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
