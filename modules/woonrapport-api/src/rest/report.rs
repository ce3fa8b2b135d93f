use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use woonrapport_engine::consistency_checks;

use crate::AppState;

/// Full report payload. Only valid for a run that reached `done`; a
/// failed or in-flight run answers 409 with its current state.
pub async fn run_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let run = match state.store.load(id).await {
        Ok(Some(run)) => run,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("run {id} not found")})),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "cannot load run for report");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if run.status != woonrapport_common::RunStatus::Done {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "report not ready",
                "status": run.status.as_str(),
                "run_error": run.error,
            })),
        )
            .into_response();
    }

    let checks = consistency_checks(&run.chapters, &run.facts);

    Json(json!({
        "run_id": run.id,
        "generated_at": run.updated_at,
        "facts": run.facts,
        "kpis": run.kpis,
        "chapters": run.chapters,
        "unknown_fields": run.unknown_fields,
        "sources": run.sources,
        "artifacts": run.artifacts,
        "consistency_checks": checks,
    }))
    .into_response()
}
