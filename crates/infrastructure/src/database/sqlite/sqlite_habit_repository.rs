use async_trait::async_trait;
use chrono::Utc;
use habits_core::{HabitError, HabitResult};
use habits_domain::entities::{Habit, HabitDraft};
use habits_domain::repositories::HabitRepository;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

const HABIT_COLUMNS: &str = "id, owner_id, place, action, is_pleasant, related_habit, period, reward, \
     time_success, max_time_processing, is_public, frequency, created_at, updated_at";

pub struct SqliteHabitRepository {
    pool: SqlitePool,
}

impl SqliteHabitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_habit(row: &sqlx::sqlite::SqliteRow) -> HabitResult<Habit> {
        Ok(Habit {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            place: row.try_get("place")?,
            action: row.try_get("action")?,
            is_pleasant: row.try_get("is_pleasant")?,
            related_habit: row.try_get("related_habit")?,
            period: row.try_get("period")?,
            reward: row.try_get("reward")?,
            time_success: row.try_get("time_success")?,
            max_time_processing: row.try_get("max_time_processing")?,
            is_public: row.try_get("is_public")?,
            frequency: row.try_get("frequency")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_list(
        &self,
        context: &OperationContext,
        sql: &str,
        owner_id: Option<i64>,
    ) -> HabitResult<Vec<Habit>> {
        let mut query = sqlx::query(sql);
        if let Some(owner_id) = owner_id {
            query = query.bind(owner_id);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(context, e))?;

        rows.iter().map(Self::row_to_habit).collect()
    }
}

#[async_trait]
impl HabitRepository for SqliteHabitRepository {
    #[instrument(skip(self, draft), fields(action = %draft.action))]
    async fn create(&self, owner_id: i64, draft: &HabitDraft) -> HabitResult<Habit> {
        let context = OperationContext::new(RepositoryOperation::Create, "习惯")
            .with_additional_info(format!("用户={owner_id}"));
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO habits (owner_id, place, action, is_pleasant, related_habit, period, reward,
                                time_success, max_time_processing, is_public, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {HABIT_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(&draft.place)
        .bind(&draft.action)
        .bind(draft.is_pleasant)
        .bind(draft.related_habit)
        .bind(draft.period)
        .bind(&draft.reward)
        .bind(draft.time_success)
        .bind(draft.max_time_processing)
        .bind(draft.is_public)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let habit = Self::row_to_habit(&row)?;
        debug!("创建习惯成功: {}", habit.entity_description());
        Ok(habit)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> HabitResult<Option<Habit>> {
        let context = OperationContext::new(RepositoryOperation::Read, "习惯").with_id(id);

        let row = sqlx::query(&format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(Self::row_to_habit).transpose()
    }

    #[instrument(skip(self, draft))]
    async fn update(&self, id: i64, draft: &HabitDraft) -> HabitResult<Habit> {
        let context = OperationContext::new(RepositoryOperation::Update, "习惯").with_id(id);

        let row = sqlx::query(&format!(
            r#"
            UPDATE habits
            SET place = $1, action = $2, is_pleasant = $3, related_habit = $4, period = $5,
                reward = $6, time_success = $7, max_time_processing = $8, is_public = $9,
                updated_at = $10
            WHERE id = $11
            RETURNING {HABIT_COLUMNS}
            "#
        ))
        .bind(&draft.place)
        .bind(&draft.action)
        .bind(draft.is_pleasant)
        .bind(draft.related_habit)
        .bind(draft.period)
        .bind(&draft.reward)
        .bind(draft.time_success)
        .bind(draft.max_time_processing)
        .bind(draft.is_public)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match row {
            Some(row) => Self::row_to_habit(&row),
            None => Err(HabitError::habit_not_found(id)),
        }
    }

    #[instrument(skip(self))]
    async fn set_frequency(&self, id: i64, frequency: Option<&str>) -> HabitResult<()> {
        let context = OperationContext::new(RepositoryOperation::Update, "习惯").with_id(id);

        let result = sqlx::query("UPDATE habits SET frequency = $1 WHERE id = $2")
            .bind(frequency)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(HabitError::habit_not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> HabitResult<bool> {
        let context = OperationContext::new(RepositoryOperation::Delete, "习惯").with_id(id);

        let result = sqlx::query("DELETE FROM habits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_by_owner(&self, owner_id: i64) -> HabitResult<Vec<Habit>> {
        let context = OperationContext::new(RepositoryOperation::Query, "习惯")
            .with_additional_info(format!("用户={owner_id}"));
        let sql = format!("SELECT {HABIT_COLUMNS} FROM habits WHERE owner_id = $1 ORDER BY id");
        self.fetch_list(&context, &sql, Some(owner_id)).await
    }

    #[instrument(skip(self))]
    async fn list_public(&self) -> HabitResult<Vec<Habit>> {
        let context = OperationContext::new(RepositoryOperation::Query, "公开习惯");
        let sql = format!("SELECT {HABIT_COLUMNS} FROM habits WHERE is_public = TRUE ORDER BY id");
        self.fetch_list(&context, &sql, None).await
    }

    #[instrument(skip(self))]
    async fn count_referencing(&self, id: i64) -> HabitResult<usize> {
        let context = OperationContext::new(RepositoryOperation::Query, "引用习惯").with_id(id);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM habits WHERE related_habit = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn health_check(&self) -> HabitResult<()> {
        let context = OperationContext::new(RepositoryOperation::Query, "健康检查");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        Ok(())
    }
}
