use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

const DEFAULT_PURGE_AGE_DAYS: i64 = 30;

#[derive(Deserialize, Default)]
pub struct PurgeRequest {
    /// Explicit cutoff; wins over `older_than_days`.
    before: Option<DateTime<Utc>>,
    older_than_days: Option<i64>,
}

/// Operator cleanup: delete done/failed runs last touched before the
/// cutoff. Waiting and running runs are never purged.
pub async fn purge_runs(
    State(state): State<Arc<AppState>>,
    body: Option<Json<PurgeRequest>>,
) -> impl IntoResponse {
    let Json(body) = body.unwrap_or_default();
    let days = body.older_than_days.unwrap_or(DEFAULT_PURGE_AGE_DAYS);
    if days < 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "older_than_days must not be negative"})),
        )
            .into_response();
    }
    let cutoff = body.before.unwrap_or_else(|| Utc::now() - Duration::days(days));

    match state.store.purge_terminal_before(cutoff).await {
        Ok(purged) => {
            info!(purged, %cutoff, "terminal runs purged");
            (StatusCode::OK, Json(json!({"purged": purged, "cutoff": cutoff}))).into_response()
        }
        Err(e) => {
            error!(error = %e, "purge failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Liveness plus AI backend state, so the UI can show up front whether
/// narrative generation will be model-written or rule-based.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ai_health = state.provider.check_health().await;
    // A lookup for a nil id exercises the database path end to end.
    let store_ok = state.store.load(uuid::Uuid::nil()).await.is_ok();
    Json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": if store_ok { "ok" } else { "unreachable" },
        "ai": {
            "provider": state.provider.name(),
            "model": state.provider.model(),
            "health": ai_health,
        },
    }))
}
