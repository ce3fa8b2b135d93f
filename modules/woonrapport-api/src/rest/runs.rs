use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use woonrapport_common::{FactStore, RunInput, RunRecord, RunStatus};
use woonrapport_engine::CancelFlag;

use crate::AppState;

#[derive(Deserialize)]
pub struct CreateRunRequest {
    url: Option<String>,
    html: Option<String>,
    #[serde(default)]
    media_urls: Vec<String>,
    #[serde(default)]
    extra_facts: Vec<String>,
}

#[derive(Deserialize)]
pub struct PasteRequest {
    html: String,
    #[serde(default)]
    media_urls: Vec<String>,
    #[serde(default)]
    extra_facts: Vec<String>,
}

fn bad_request(message: &str) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

fn conflict(message: &str) -> axum::response::Response {
    (StatusCode::CONFLICT, Json(json!({"error": message}))).into_response()
}

fn not_found(id: Uuid) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("run {id} not found")})),
    )
        .into_response()
}

fn internal(e: impl std::fmt::Display) -> axum::response::Response {
    error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

pub async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRunRequest>,
) -> impl IntoResponse {
    let url = body.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let html = body.html.filter(|h| !h.trim().is_empty());

    if url.is_none() && html.is_none() {
        return bad_request("either a listing url or pasted html is required");
    }
    if let Some(url) = url {
        if url.len() > 2048 {
            return bad_request("URL too long (max 2048 characters)");
        }
        match url::Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(_) => return bad_request("URL must use http or https scheme"),
            Err(_) => return bad_request("invalid URL"),
        }
    }

    let run = RunRecord::new(RunInput {
        url: url.map(str::to_string),
        html,
        media_urls: body.media_urls,
        extra_facts: body.extra_facts,
    });

    if let Err(e) = state.store.insert(&run).await {
        return internal(e);
    }
    info!(run_id = %run.id, has_url = run.input.url.is_some(), "run created");

    (
        StatusCode::CREATED,
        Json(json!({"run_id": run.id, "status": run.status.as_str()})),
    )
        .into_response()
}

pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let run = match state.store.load(id).await {
        Ok(Some(run)) => run,
        Ok(None) => return not_found(id),
        Err(e) => return internal(e),
    };

    match run.status {
        RunStatus::Queued => {}
        RunStatus::WaitingInput => {
            return conflict("run is waiting for pasted input, use the input endpoint")
        }
        RunStatus::Running => return conflict("run is already executing"),
        RunStatus::Done | RunStatus::Failed => return conflict("run already settled"),
    }

    if !launch(&state, id).await {
        return conflict("run is already executing");
    }

    (StatusCode::ACCEPTED, Json(json!({"status": "started"}))).into_response()
}

pub async fn provide_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PasteRequest>,
) -> impl IntoResponse {
    if body.html.trim().is_empty() {
        return bad_request("pasted html must not be empty");
    }

    let mut run = match state.store.load(id).await {
        Ok(Some(run)) => run,
        Ok(None) => return not_found(id),
        Err(e) => return internal(e),
    };
    if run.status != RunStatus::WaitingInput {
        return conflict("run is not waiting for input");
    }

    run.pasted_html = Some(body.html);
    run.facts.merge(FactStore {
        media_urls: body.media_urls,
        extra_notes: body.extra_facts,
        ..Default::default()
    });
    if let Err(e) = state.store.update(&run).await {
        return internal(e);
    }

    if !launch(&state, id).await {
        return conflict("run is already executing");
    }
    info!(run_id = %id, "pasted input received, run resumed");

    (StatusCode::ACCEPTED, Json(json!({"status": "resumed"}))).into_response()
}

pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    // An executing run is cancelled cooperatively at the next step
    // boundary; a parked or queued one is settled right here.
    if let Some(flag) = state.cancels.lock().await.get(&id) {
        flag.store(true, Ordering::Relaxed);
        return (StatusCode::ACCEPTED, Json(json!({"status": "cancelling"}))).into_response();
    }

    let mut run = match state.store.load(id).await {
        Ok(Some(run)) => run,
        Ok(None) => return not_found(id),
        Err(e) => return internal(e),
    };
    if run.status.is_terminal() {
        return conflict("run already settled");
    }

    run.status = RunStatus::Failed;
    run.error = Some("cancelled by user".to_string());
    run.updated_at = chrono::Utc::now();
    if let Err(e) = state.store.update(&run).await {
        return internal(e);
    }
    info!(run_id = %id, "parked run cancelled");

    (StatusCode::ACCEPTED, Json(json!({"status": "cancelled"}))).into_response()
}

pub async fn run_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let run = match state.store.load(id).await {
        Ok(Some(run)) => run,
        Ok(None) => return not_found(id),
        Err(e) => return internal(e),
    };

    Json(json!({
        "run_id": run.id,
        "status": run.status.as_str(),
        "percent": run.progress_percent(),
        "steps": run.steps,
        "error": run.error,
        "created_at": run.created_at,
        "updated_at": run.updated_at,
    }))
    .into_response()
}

/// Register a cancel flag and spawn the pipeline. Returns false when a
/// task for this run is already in flight.
async fn launch(state: &Arc<AppState>, id: Uuid) -> bool {
    let flag = CancelFlag::default();
    {
        let mut cancels = state.cancels.lock().await;
        if cancels.contains_key(&id) {
            return false;
        }
        cancels.insert(id, flag.clone());
    }

    let state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = state.runner.run(id, flag).await {
            error!(run_id = %id, error = %e, "pipeline aborted");
        }
        state.cancels.lock().await.remove(&id);
    });
    true
}
