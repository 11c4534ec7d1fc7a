//! 仓储操作的错误上下文
//!
//! 把 sqlx 错误连同操作类型和实体描述一起转换为 `HabitError`，并记录结构化日志。

use std::fmt;

use habits_core::HabitError;
use sqlx::Error as SqlxError;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Delete,
    Query,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Query => write!(f, "列表查询"),
        }
    }
}

/// 仓储操作上下文
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: &'static str,
    pub entity_id: Option<i64>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: &'static str) -> Self {
        Self {
            operation,
            entity,
            entity_id: None,
            additional_info: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_additional_info<S: Into<String>>(mut self, info: S) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.entity_id, &self.additional_info) {
            (Some(id), Some(info)) => format!("{} (ID: {}, {})", self.entity, id, info),
            (Some(id), None) => format!("{} (ID: {})", self.entity, id),
            (None, Some(info)) => format!("{} ({})", self.entity, info),
            (None, None) => self.entity.to_string(),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    pub fn database_error(context: &OperationContext, error: SqlxError) -> HabitError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation;

        let error_msg = match &error {
            SqlxError::Database(db_error) if db_error.is_unique_violation() => {
                format!("{operation_desc}{entity_desc}时发生唯一约束冲突: {db_error}")
            }
            SqlxError::Database(db_error) if db_error.is_foreign_key_violation() => {
                format!("{operation_desc}{entity_desc}时发生外键约束冲突: {db_error}")
            }
            SqlxError::RowNotFound => {
                format!("{operation_desc}{entity_desc}时未找到记录")
            }
            SqlxError::PoolClosed => {
                format!("{operation_desc}{entity_desc}时数据库连接池已关闭")
            }
            SqlxError::PoolTimedOut => {
                format!("{operation_desc}{entity_desc}时数据库连接池超时")
            }
            _ => format!("{operation_desc}{entity_desc}时发生数据库错误: {error}"),
        };

        error!(error = %error, "{}", error_msg);
        HabitError::DatabaseOperation(error_msg)
    }
}
