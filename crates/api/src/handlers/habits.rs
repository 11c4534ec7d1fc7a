use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use habits_domain::entities::{HabitDraft, HabitPatch, PublicHabitView};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    auth::AuthenticatedUser,
    error::{ApiError, ApiResult},
    response::ApiResponse,
    routes::AppState,
    types::UpdateValue,
    validation::habit::{validate_draft, validate_patch},
};

fn default_period() -> i32 {
    1
}

/// 习惯创建请求
#[derive(Debug, Deserialize)]
pub struct CreateHabitRequest {
    pub place: String,
    pub action: String,
    #[serde(default)]
    pub is_pleasant: bool,
    #[serde(default)]
    pub related_habit: Option<i64>,
    #[serde(default = "default_period")]
    pub period: i32,
    #[serde(default)]
    pub reward: Option<String>,
    pub time_success: i32,
    pub max_time_processing: i32,
    #[serde(default)]
    pub is_public: bool,
}

impl From<CreateHabitRequest> for HabitDraft {
    fn from(request: CreateHabitRequest) -> Self {
        HabitDraft {
            place: request.place,
            action: request.action,
            is_pleasant: request.is_pleasant,
            related_habit: request.related_habit,
            period: request.period,
            reward: request.reward.unwrap_or_default(),
            time_success: request.time_success,
            max_time_processing: request.max_time_processing,
            is_public: request.is_public,
        }
    }
}

/// 习惯部分更新请求，`related_habit` 和 `reward` 可显式置空
#[derive(Debug, Default, Deserialize)]
pub struct UpdateHabitRequest {
    pub place: Option<String>,
    pub action: Option<String>,
    pub is_pleasant: Option<bool>,
    #[serde(default)]
    pub related_habit: UpdateValue<i64>,
    pub period: Option<i32>,
    #[serde(default)]
    pub reward: UpdateValue<String>,
    pub time_success: Option<i32>,
    pub max_time_processing: Option<i32>,
    pub is_public: Option<bool>,
}

impl From<UpdateHabitRequest> for HabitPatch {
    fn from(request: UpdateHabitRequest) -> Self {
        HabitPatch {
            place: request.place,
            action: request.action,
            is_pleasant: request.is_pleasant,
            related_habit: request.related_habit.into_patch(),
            period: request.period,
            reward: request
                .reward
                .into_patch()
                .map(|reward| reward.unwrap_or_default()),
            time_success: request.time_success,
            max_time_processing: request.max_time_processing,
            is_public: request.is_public,
        }
    }
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// 创建习惯
#[instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn create_habit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreateHabitRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(bad_json)?;
    let draft = HabitDraft::from(request);
    validate_draft(&draft)?;

    let habit = state.habits.create(user.user_id, draft).await?;
    Ok(ApiResponse::created(habit))
}

/// 当前用户的习惯列表
pub async fn list_habits(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let habits = state.habits.list_own(user.user_id).await?;
    Ok(ApiResponse::ok(habits))
}

/// 公开习惯列表，只暴露部分字段
pub async fn list_public_habits(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let habits = state.habits.list_public().await?;
    let views: Vec<PublicHabitView> = habits.iter().map(PublicHabitView::from).collect();
    Ok(ApiResponse::ok(views))
}

/// 获取单个习惯
pub async fn get_habit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let habit = state.habits.get(user.user_id, id).await?;
    Ok(ApiResponse::ok(habit))
}

/// 部分更新习惯
#[instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn update_habit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateHabitRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(bad_json)?;
    let patch = HabitPatch::from(request);
    validate_patch(&patch)?;

    let habit = state.habits.update(user.user_id, id, patch).await?;
    Ok(ApiResponse::ok(habit).with_message("Привычка обновлена"))
}

/// 删除习惯
#[instrument(skip(state), fields(user_id = user.user_id))]
pub async fn delete_habit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    state.habits.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let request: CreateHabitRequest = serde_json::from_str(
            r#"{"place":"Дом","action":"Читать","time_success":60,"max_time_processing":60}"#,
        )
        .unwrap();
        let draft = HabitDraft::from(request);
        assert_eq!(draft.period, 1);
        assert!(!draft.is_pleasant);
        assert!(!draft.is_public);
        assert_eq!(draft.reward, "");
        assert!(draft.related_habit.is_none());
    }

    #[test]
    fn test_update_request_null_clears_related_habit() {
        let request: UpdateHabitRequest =
            serde_json::from_str(r#"{"related_habit":null,"reward":"Кофе"}"#).unwrap();
        let patch = HabitPatch::from(request);
        assert_eq!(patch.related_habit, Some(None));
        assert_eq!(patch.reward.as_deref(), Some("Кофе"));
        assert!(patch.place.is_none());

        let request: UpdateHabitRequest = serde_json::from_str(r#"{"reward":null}"#).unwrap();
        let patch = HabitPatch::from(request);
        assert_eq!(patch.reward.as_deref(), Some(""));
        assert!(patch.related_habit.is_none());
    }
}
