use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::routes::AppState;

/// 存活与数据库连通性检查，无需认证
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, overall, database) = match state.habits.health_check().await {
        Ok(()) => (StatusCode::OK, "ok", "ok".to_string()),
        Err(e) => {
            warn!("健康检查发现数据库不可用: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", e.to_string())
        }
    };

    (
        status,
        Json(json!({
            "status": overall,
            "database": database,
            "service": "habit-tracker",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}
