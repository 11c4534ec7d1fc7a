use std::sync::Arc;

use anyhow::{bail, Context, Result};
use habits_api::{create_app, JwtService};
use habits_core::{AppConfig, HabitError};
use habits_dispatcher::{ReminderBeat, TelegramReminderSender};
use habits_domain::entities::User;
use habits_domain::repositories::UserRepository;
use habits_domain::services::{HabitService, ScheduleSynchronizer};
use habits_infrastructure::database::{
    DatabaseManager, SqliteCrontabScheduleRepository, SqliteHabitRepository,
    SqlitePeriodicTaskRepository, SqliteUserRepository,
};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info};

/// 主应用程序：持有数据库连接和各仓储
pub struct Application {
    config: AppConfig,
    db: DatabaseManager,
    users: Arc<SqliteUserRepository>,
    habits: Arc<SqliteHabitRepository>,
    schedules: Arc<SqliteCrontabScheduleRepository>,
    tasks: Arc<SqlitePeriodicTaskRepository>,
}

impl Application {
    /// 连接数据库并创建表结构
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("连接数据库: {}", config.database.url);

        let db = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        db.migrate().await.context("创建数据库表结构失败")?;

        let pool = db.pool().clone();
        Ok(Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            habits: Arc::new(SqliteHabitRepository::new(pool.clone())),
            schedules: Arc::new(SqliteCrontabScheduleRepository::new(pool.clone())),
            tasks: Arc::new(SqlitePeriodicTaskRepository::new(pool)),
            config,
            db,
        })
    }

    fn habit_service(&self) -> Arc<HabitService> {
        Arc::new(HabitService::new(
            self.habits.clone(),
            self.users.clone(),
            ScheduleSynchronizer::new(self.schedules.clone(), self.tasks.clone()),
        ))
    }

    /// 按配置启动API服务器和提醒节拍器，直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.api.enabled && !self.config.beat.enabled {
            bail!("API和提醒节拍器均被禁用，请检查配置");
        }

        let mut handles = Vec::new();

        if self.config.beat.enabled {
            let sender = TelegramReminderSender::new(&self.config.telegram)
                .context("创建Telegram发送器失败")?;
            let beat = Arc::new(
                ReminderBeat::new(
                    self.tasks.clone(),
                    self.schedules.clone(),
                    self.habits.clone(),
                    self.users.clone(),
                    Arc::new(sender),
                    &self.config.beat,
                )
                .context("创建提醒节拍器失败")?,
            );
            handles.push(tokio::spawn(beat.run(shutdown_rx.resubscribe())));
        }

        if self.config.api.enabled {
            let app = create_app(self.habit_service(), &self.config.auth, &self.config.api);
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;

            info!("API服务器启动在 http://{}", self.config.api.bind_address);

            let mut api_shutdown = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = api_shutdown.recv().await;
                        info!("API服务器收到关闭信号");
                    })
                    .await;
                if let Err(e) = result {
                    error!("API服务器运行失败: {}", e);
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("组件任务异常退出: {}", e);
            }
        }

        info!("所有组件已停止");
        Ok(())
    }

    async fn find_user(&self, email: &str) -> Result<User> {
        self.users
            .find_by_email(email)
            .await?
            .ok_or_else(|| HabitError::user_not_found(email))
            .with_context(|| format!("用户不存在: {email}"))
    }

    pub async fn create_user(&self, email: &str, chat_id: Option<&str>) -> Result<User> {
        let user = self
            .users
            .create(email, chat_id)
            .await
            .with_context(|| format!("创建用户失败: {email}"))?;
        info!("创建用户 {} (ID: {})", user.email, user.id);
        Ok(user)
    }

    /// 更新通知渠道；已有的习惯需要再次更新才会注册提醒
    pub async fn set_chat(&self, email: &str, chat_id: Option<&str>) -> Result<User> {
        let user = self.find_user(email).await?;
        let user = self.users.set_chat_id(user.id, chat_id).await?;
        info!("用户 {} 的通知渠道已更新", user.email);
        Ok(user)
    }

    /// 为用户签发访问令牌
    pub async fn issue_token(&self, email: &str) -> Result<String> {
        let user = self.find_user(email).await?;
        if !user.is_active {
            bail!("用户已被停用: {email}");
        }
        JwtService::from_config(&self.config.auth)
            .generate_token(user.id)
            .context("生成令牌失败")
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
