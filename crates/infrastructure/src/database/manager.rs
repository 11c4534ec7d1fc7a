use std::str::FromStr;
use std::time::Duration;

use habits_core::{DatabaseConfig, HabitResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// 建表语句，可重复执行
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        chat_id TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS habits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        place TEXT NOT NULL,
        action TEXT NOT NULL,
        is_pleasant BOOLEAN NOT NULL DEFAULT FALSE,
        related_habit INTEGER,
        period INTEGER NOT NULL DEFAULT 1,
        reward TEXT NOT NULL DEFAULT '',
        time_success INTEGER NOT NULL,
        max_time_processing INTEGER NOT NULL,
        is_public BOOLEAN NOT NULL DEFAULT FALSE,
        frequency TEXT,
        created_at DATETIME NOT NULL,
        updated_at DATETIME NOT NULL,
        FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (related_habit) REFERENCES habits(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS crontab_schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        minute TEXT NOT NULL,
        hour TEXT NOT NULL,
        day_of_week TEXT NOT NULL,
        day_of_month TEXT NOT NULL,
        month_of_year TEXT NOT NULL,
        UNIQUE (minute, hour, day_of_week, day_of_month, month_of_year)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS periodic_tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        task TEXT NOT NULL,
        args TEXT NOT NULL DEFAULT '[]',
        description TEXT NOT NULL DEFAULT '',
        crontab_id INTEGER NOT NULL,
        habit_id INTEGER NOT NULL UNIQUE,
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        last_run_at DATETIME,
        total_run_count INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME NOT NULL,
        FOREIGN KEY (crontab_id) REFERENCES crontab_schedules(id),
        FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_habits_owner_id ON habits(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_habits_is_public ON habits(is_public)",
    "CREATE INDEX IF NOT EXISTS idx_periodic_tasks_enabled ON periodic_tasks(enabled)",
];

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> HabitResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds));

        // 内存库的每个连接都是独立的数据库，只能保留一个常驻连接
        pool_options = if config.is_in_memory() {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
                .max_lifetime(Duration::from_secs(1800)) // 30分钟默认生命周期
        };

        let pool = pool_options.connect_with(connect_options).await?;
        info!("数据库连接池已建立: {}", config.url);
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> HabitResult<()> {
        debug!("执行数据库迁移");
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("数据库迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> HabitResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = DatabaseManager::new(&memory_config()).await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.health_check().await.is_ok());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["crontab_schedules", "habits", "periodic_tasks", "users"]
        );

        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("habits.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseConfig::default()
        };

        let db = DatabaseManager::new(&config).await.unwrap();
        db.migrate().await.unwrap();
        assert!(path.exists());
        db.close().await;
    }
}
