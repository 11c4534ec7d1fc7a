use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use habits_core::{HabitError, RuleViolation};
use serde_json::json;
use tracing::error;

use crate::auth::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("习惯服务错误: {0}")]
    Habit(#[from] HabitError),

    #[error("认证错误: {0}")]
    Authentication(#[from] AuthError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Habit(HabitError::Validation(violations)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                violations
                    .first()
                    .map(|v| v.message.clone())
                    .unwrap_or_else(|| "Некорректные данные".to_string()),
            ),
            ApiError::Habit(HabitError::HabitNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "HABIT_NOT_FOUND",
                format!("Привычка {id} не найдена"),
            ),
            ApiError::Habit(HabitError::UserNotFound { .. }) => (
                StatusCode::UNAUTHORIZED,
                "USER_NOT_FOUND",
                "Пользователь не найден".to_string(),
            ),
            ApiError::Habit(HabitError::Forbidden(_)) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "У вас нет прав на выполнение этого действия".to_string(),
            ),
            ApiError::Habit(HabitError::HabitInUse { id, .. }) => (
                StatusCode::CONFLICT,
                "HABIT_IN_USE",
                format!("Привычка {id} выбрана связанной в других привычках"),
            ),
            ApiError::Habit(HabitError::Synchronization(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SYNCHRONIZATION_ERROR",
                "Привычка сохранена, но напоминание не удалось запланировать".to_string(),
            ),
            ApiError::Habit(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Внутренняя ошибка сервера".to_string(),
            ),
            ApiError::Authentication(auth_error) => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_ERROR",
                auth_error.to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        }
    }

    fn details(&self) -> Option<&[RuleViolation]> {
        match self {
            ApiError::Habit(HabitError::Validation(violations)) => Some(violations),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let mut error_body = json!({
            "code": code,
            "message": message,
        });
        if let Some(details) = self.details() {
            error_body["details"] = json!(details);
        }

        let body = Json(json!({
            "success": false,
            "error": error_body,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_habit_error_status_codes() {
        let cases = vec![
            (HabitError::habit_not_found(1), StatusCode::NOT_FOUND),
            (HabitError::forbidden("foreign"), StatusCode::FORBIDDEN),
            (
                HabitError::validation(vec![RuleViolation::new("time_limit_exceeded", "too long")]),
                StatusCode::BAD_REQUEST,
            ),
            (
                HabitError::HabitInUse { id: 1, dependents: 2 },
                StatusCode::CONFLICT,
            ),
            (
                HabitError::synchronization("store down"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                HabitError::DatabaseOperation("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (habit_error, expected) in cases {
            let response = ApiError::from(habit_error).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_validation_uses_first_violation() {
        let error = ApiError::from(HabitError::validation(vec![
            RuleViolation::new("a", "первое"),
            RuleViolation::new("b", "второе"),
        ]));
        let (_, code, message) = error.parts();
        assert_eq!(code, "VALIDATION_ERROR");
        assert_eq!(message, "первое");
        assert_eq!(error.details().map(|d| d.len()), Some(2));
    }

    #[test]
    fn test_auth_error_is_unauthorized() {
        let response = ApiError::from(AuthError::MissingToken).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
