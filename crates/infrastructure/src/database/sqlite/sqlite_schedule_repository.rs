use async_trait::async_trait;
use habits_core::HabitResult;
use habits_domain::entities::CrontabSchedule;
use habits_domain::repositories::CrontabScheduleRepository;
use habits_domain::value_objects::CrontabExpression;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

pub struct SqliteCrontabScheduleRepository {
    pool: SqlitePool,
}

impl SqliteCrontabScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> HabitResult<CrontabSchedule> {
        Ok(CrontabSchedule {
            id: row.try_get("id")?,
            minute: row.try_get("minute")?,
            hour: row.try_get("hour")?,
            day_of_week: row.try_get("day_of_week")?,
            day_of_month: row.try_get("day_of_month")?,
            month_of_year: row.try_get("month_of_year")?,
        })
    }
}

#[async_trait]
impl CrontabScheduleRepository for SqliteCrontabScheduleRepository {
    /// 依赖唯一索引完成去重，并发创建同一计划时只会落一行
    #[instrument(skip(self), fields(crontab = %expr))]
    async fn get_or_create(&self, expr: &CrontabExpression) -> HabitResult<CrontabSchedule> {
        let context = OperationContext::new(RepositoryOperation::Create, "crontab计划")
            .with_additional_info(expr.to_string());

        let inserted = sqlx::query(
            r#"
            INSERT INTO crontab_schedules (minute, hour, day_of_week, day_of_month, month_of_year)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (minute, hour, day_of_week, day_of_month, month_of_year) DO NOTHING
            "#,
        )
        .bind(&expr.minute)
        .bind(&expr.hour)
        .bind(&expr.day_of_week)
        .bind(&expr.day_of_month)
        .bind(&expr.month_of_year)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if inserted.rows_affected() > 0 {
            debug!("新建crontab计划: {}", expr);
        }

        let row = sqlx::query(
            r#"
            SELECT id, minute, hour, day_of_week, day_of_month, month_of_year
            FROM crontab_schedules
            WHERE minute = $1 AND hour = $2 AND day_of_week = $3
              AND day_of_month = $4 AND month_of_year = $5
            "#,
        )
        .bind(&expr.minute)
        .bind(&expr.hour)
        .bind(&expr.day_of_week)
        .bind(&expr.day_of_month)
        .bind(&expr.month_of_year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Self::row_to_schedule(&row)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> HabitResult<Option<CrontabSchedule>> {
        let context = OperationContext::new(RepositoryOperation::Read, "crontab计划").with_id(id);

        let row = sqlx::query(
            "SELECT id, minute, hour, day_of_week, day_of_month, month_of_year FROM crontab_schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(Self::row_to_schedule).transpose()
    }
}
