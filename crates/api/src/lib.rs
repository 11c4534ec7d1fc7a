//! # Habits API
//!
//! 习惯追踪服务的REST接口，基于Axum构建。
//!
//! 除 `/health` 外的所有路由都需要 `Authorization: Bearer <jwt>`，
//! 令牌的 `sub` 字段为用户ID。业务校验失败返回 400，
//! 响应体中 `error.message` 为第一条违反的规则，`error.details` 为全部规则。
//! 删除仍被其他习惯引用的习惯返回 409。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod types;
pub mod validation;

use axum::Router;
use habits_core::{ApiConfig, AuthConfig};
use habits_domain::services::HabitService;
use std::sync::Arc;
use tower::ServiceBuilder;

pub use auth::{AuthenticatedUser, JwtService};
pub use error::{ApiError, ApiResult};
use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(habits: Arc<HabitService>, auth: &AuthConfig, api: &ApiConfig) -> Router {
    let state = AppState {
        habits,
        jwt: Arc::new(JwtService::from_config(auth)),
    };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer(api))
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
