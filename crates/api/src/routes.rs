use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use habits_domain::services::HabitService;
use std::sync::Arc;

use crate::auth::JwtService;
use crate::handlers::{
    habits::{
        create_habit, delete_habit, get_habit, list_habits, list_public_habits, update_habit,
    },
    health::health_check,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub habits: Arc<HabitService>,
    pub jwt: Arc<JwtService>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 习惯管理API
        .route("/habits", get(list_habits))
        .route("/habits/create", post(create_habit))
        .route("/habits/public", get(list_public_habits))
        .route("/habits/{id}", get(get_habit))
        .route("/habits/{id}/update", patch(update_habit))
        .route("/habits/{id}/delete", delete(delete_habit))
        .with_state(state)
}
