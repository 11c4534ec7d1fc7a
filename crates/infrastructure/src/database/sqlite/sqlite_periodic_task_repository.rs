use async_trait::async_trait;
use chrono::{DateTime, Utc};
use habits_core::HabitResult;
use habits_domain::entities::{NewPeriodicTask, PeriodicTask};
use habits_domain::repositories::PeriodicTaskRepository;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

const TASK_COLUMNS: &str = "id, name, task, args, description, crontab_id, habit_id, enabled, \
     last_run_at, total_run_count, created_at";

pub struct SqlitePeriodicTaskRepository {
    pool: SqlitePool,
}

impl SqlitePeriodicTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> HabitResult<PeriodicTask> {
        Ok(PeriodicTask {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            task: row.try_get("task")?,
            args: row.try_get("args")?,
            description: row.try_get("description")?,
            crontab_id: row.try_get("crontab_id")?,
            habit_id: row.try_get("habit_id")?,
            enabled: row.try_get("enabled")?,
            last_run_at: row.try_get("last_run_at")?,
            total_run_count: row.try_get("total_run_count")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl PeriodicTaskRepository for SqlitePeriodicTaskRepository {
    #[instrument(skip(self, task), fields(habit_id = task.habit_id, crontab_id = task.crontab_id))]
    async fn create(&self, task: &NewPeriodicTask) -> HabitResult<PeriodicTask> {
        let context = OperationContext::new(RepositoryOperation::Create, "周期任务")
            .with_additional_info(task.name.clone());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO periodic_tasks (name, task, args, description, crontab_id, habit_id, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&task.name)
        .bind(&task.task)
        .bind(&task.args)
        .bind(&task.description)
        .bind(task.crontab_id)
        .bind(task.habit_id)
        .bind(true)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = Self::row_to_task(&row)?;
        debug!("创建周期任务成功: {} (ID: {})", created.name, created.id);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn delete_for_habit(&self, habit_id: i64) -> HabitResult<u64> {
        let context = OperationContext::new(RepositoryOperation::Delete, "周期任务")
            .with_additional_info(format!("习惯={habit_id}"));

        let result = sqlx::query("DELETE FROM periodic_tasks WHERE habit_id = $1")
            .bind(habit_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn find_for_habit(&self, habit_id: i64) -> HabitResult<Vec<PeriodicTask>> {
        let context = OperationContext::new(RepositoryOperation::Query, "周期任务")
            .with_additional_info(format!("习惯={habit_id}"));

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM periodic_tasks WHERE habit_id = $1 ORDER BY id"
        ))
        .bind(habit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(Self::row_to_task).collect()
    }

    #[instrument(skip(self))]
    async fn list_enabled(&self) -> HabitResult<Vec<PeriodicTask>> {
        let context = OperationContext::new(RepositoryOperation::Query, "周期任务");

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM periodic_tasks WHERE enabled = TRUE ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(Self::row_to_task).collect()
    }

    #[instrument(skip(self))]
    async fn record_run(&self, id: i64, ran_at: DateTime<Utc>) -> HabitResult<()> {
        let context = OperationContext::new(RepositoryOperation::Update, "周期任务").with_id(id);

        sqlx::query(
            "UPDATE periodic_tasks SET last_run_at = $1, total_run_count = total_run_count + 1 WHERE id = $2",
        )
        .bind(ran_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(())
    }
}
