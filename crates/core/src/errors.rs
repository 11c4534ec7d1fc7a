use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单条业务规则违反记录
///
/// `rule` 是稳定的机器可读代码，`message` 原样返回给调用方。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: String,
    pub message: String,
}

impl RuleViolation {
    pub fn new<R: Into<String>, M: Into<String>>(rule: R, message: M) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
        }
    }
}

/// 习惯服务错误类型定义
#[derive(Debug, Error)]
pub enum HabitError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("习惯未找到: {id}")]
    HabitNotFound { id: i64 },

    #[error("用户未找到: {key}")]
    UserNotFound { key: String },

    #[error("数据验证失败: {}", summarize(.0))]
    Validation(Vec<RuleViolation>),

    #[error("权限不足: {0}")]
    Forbidden(String),

    #[error("习惯 {id} 仍被 {dependents} 个习惯引用")]
    HabitInUse { id: i64, dependents: usize },

    #[error("提醒计划同步失败: {0}")]
    Synchronization(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

fn summarize(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl HabitError {
    pub fn habit_not_found(id: i64) -> Self {
        Self::HabitNotFound { id }
    }

    pub fn user_not_found<S: Into<String>>(key: S) -> Self {
        Self::UserNotFound { key: key.into() }
    }

    pub fn validation(violations: Vec<RuleViolation>) -> Self {
        Self::Validation(violations)
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn synchronization<S: Into<String>>(msg: S) -> Self {
        Self::Synchronization(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 第一条违反的规则，按固定校验顺序
    pub fn primary_violation(&self) -> Option<&RuleViolation> {
        match self {
            HabitError::Validation(violations) => violations.first(),
            _ => None,
        }
    }

    /// 同步阶段的错误发生在习惯已提交之后，只能等下一次更新时修复
    pub fn is_post_commit(&self) -> bool {
        matches!(self, HabitError::Synchronization(_))
    }

    /// 网络或存储的瞬时故障，下一轮可能自行恢复
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HabitError::Database(_) | HabitError::DatabaseOperation(_) | HabitError::Notification(_)
        )
    }
}

impl From<serde_json::Error> for HabitError {
    fn from(err: serde_json::Error) -> Self {
        HabitError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for HabitError {
    fn from(err: anyhow::Error) -> Self {
        HabitError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_joins_messages() {
        let err = HabitError::validation(vec![
            RuleViolation::new("a", "первое"),
            RuleViolation::new("b", "второе"),
        ]);
        assert_eq!(err.to_string(), "数据验证失败: первое; второе");
        assert_eq!(err.primary_violation().map(|v| v.rule.as_str()), Some("a"));
    }

    #[test]
    fn test_error_classification() {
        assert!(HabitError::synchronization("boom").is_post_commit());
        assert!(!HabitError::habit_not_found(1).is_post_commit());
        assert!(HabitError::Notification("timeout".into()).is_retryable());
        assert!(!HabitError::forbidden("no").is_retryable());
        assert!(!HabitError::config_error("no chat").is_retryable());
        assert!(HabitError::habit_not_found(7).primary_violation().is_none());
    }
}
