use async_trait::async_trait;
use chrono::Utc;
use habits_core::{HabitError, HabitResult};
use habits_domain::entities::User;
use habits_domain::repositories::UserRepository;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::error_handling::{OperationContext, RepositoryErrorHelpers, RepositoryOperation};

const USER_COLUMNS: &str = "id, email, chat_id, is_active, created_at";

/// SQLite implementation of UserRepository
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> HabitResult<User> {
        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            chat_id: row.try_get("chat_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    #[instrument(skip(self))]
    async fn create(&self, email: &str, chat_id: Option<&str>) -> HabitResult<User> {
        let context = OperationContext::new(RepositoryOperation::Create, "用户")
            .with_additional_info(format!("email={email}"));

        let row = sqlx::query(&format!(
            "INSERT INTO users (email, chat_id, is_active, created_at) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(chat_id)
        .bind(true)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let user = Self::row_to_user(&row)?;
        debug!("创建用户成功: {} (ID: {})", user.email, user.id);
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> HabitResult<Option<User>> {
        let context = OperationContext::new(RepositoryOperation::Read, "用户").with_id(id);

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> HabitResult<Option<User>> {
        let context = OperationContext::new(RepositoryOperation::Read, "用户")
            .with_additional_info(format!("email={email}"));

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    #[instrument(skip(self))]
    async fn set_chat_id(&self, id: i64, chat_id: Option<&str>) -> HabitResult<User> {
        let context = OperationContext::new(RepositoryOperation::Update, "用户").with_id(id);

        let row = sqlx::query(&format!(
            "UPDATE users SET chat_id = $1 WHERE id = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(chat_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match row {
            Some(row) => Self::row_to_user(&row),
            None => Err(HabitError::user_not_found(id.to_string())),
        }
    }
}
