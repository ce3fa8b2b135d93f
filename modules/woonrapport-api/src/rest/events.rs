use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::Stream;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use woonrapport_common::{ProgressEvent, RunRecord, StepStatus};
use woonrapport_engine::RunStore;

use crate::AppState;

/// SSE stream of step transitions for one run. Opens with a snapshot
/// of the persisted state, then relays bus events for this run and
/// closes after the terminal one. A client that connects after the run
/// settled gets the snapshot and an immediate close.
pub async fn run_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Response> {
    // Subscribe before loading the snapshot: a terminal transition is
    // then either visible in the snapshot or buffered on the channel,
    // never in neither.
    let rx = state.progress.subscribe();

    let run = match state.store.load(id).await {
        Ok(Some(run)) => run,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("run {id} not found")})),
            )
                .into_response())
        }
        Err(e) => {
            tracing::error!(error = %e, "cannot load run for event stream");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    let stream = progress_stream(state.store.clone(), rx, run);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Progress view of a persisted record: the most recently touched step,
/// or a synthetic "queued" before the first transition.
fn snapshot_event(run: &RunRecord) -> ProgressEvent {
    let last = run
        .steps
        .iter()
        .rev()
        .find(|s| s.status != StepStatus::Queued);
    ProgressEvent {
        run_id: run.id,
        status: run.status,
        step: last
            .map(|s| s.step.name().to_string())
            .unwrap_or_else(|| "queued".to_string()),
        step_status: last.map(|s| s.status).unwrap_or(StepStatus::Queued),
        percent: run.progress_percent(),
    }
}

/// Snapshot first, then live events until the terminal one. The
/// receiver must have been subscribed before `run` was loaded. A lagged
/// receiver may have dropped the terminal event, so on lag the run is
/// re-loaded and the stream closed if it settled meanwhile.
fn progress_stream(
    store: Arc<dyn RunStore>,
    mut rx: broadcast::Receiver<ProgressEvent>,
    run: RunRecord,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let id = run.id;
    let snapshot = snapshot_event(&run);
    let settled = run.status.is_terminal();

    async_stream::stream! {
        if let Ok(json) = serde_json::to_string(&snapshot) {
            yield Ok::<Event, Infallible>(Event::default().event("progress").data(json));
        }
        if settled {
            return;
        }

        loop {
            match rx.recv().await {
                Ok(event) if event.run_id == id => {
                    let terminal = event.status.is_terminal();
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().event("progress").data(json));
                    }
                    if terminal {
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(run_id = %id, skipped, "event stream lagged");
                    match store.load(id).await {
                        Ok(Some(run)) if run.status.is_terminal() => {
                            if let Ok(json) = serde_json::to_string(&snapshot_event(&run)) {
                                yield Ok(Event::default().event("progress").data(json));
                            }
                            break;
                        }
                        _ => {}
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::time::timeout;

    use woonrapport_common::{PipelineStep, RunInput, RunStatus};
    use woonrapport_engine::ProgressBus;

    use crate::db::SqliteRunStore;

    async fn store_with(run: &RunRecord) -> Arc<dyn RunStore> {
        let store = SqliteRunStore::connect("sqlite::memory:").await.unwrap();
        store.insert(run).await.unwrap();
        Arc::new(store)
    }

    fn event_for(run: &RunRecord, step: PipelineStep, step_status: StepStatus) -> ProgressEvent {
        ProgressEvent {
            run_id: run.id,
            status: run.status,
            step: step.name().to_string(),
            step_status,
            percent: run.progress_percent(),
        }
    }

    async fn next_within(
        stream: &mut (impl Stream<Item = Result<Event, Infallible>> + Unpin),
    ) -> Option<Result<Event, Infallible>> {
        timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("stream did not produce an item in time")
    }

    #[tokio::test]
    async fn settled_run_closes_after_the_snapshot() {
        let mut run = RunRecord::new(RunInput::default());
        run.status = RunStatus::Done;
        let store = store_with(&run).await;
        let bus = ProgressBus::new();

        let mut stream = Box::pin(progress_stream(store, bus.subscribe(), run));
        assert!(next_within(&mut stream).await.is_some());
        assert!(next_within(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn terminal_event_published_before_first_poll_still_closes_the_stream() {
        let mut run = RunRecord::new(RunInput::default());
        run.status = RunStatus::Running;
        let store = store_with(&run).await;
        let bus = ProgressBus::new();
        let rx = bus.subscribe();

        // Settles between subscription and the first poll; the event
        // must be buffered, not lost.
        let mut done = run.clone();
        done.status = RunStatus::Done;
        bus.publish(event_for(&done, PipelineStep::FinalizeArtifact, StepStatus::Done));

        let mut stream = Box::pin(progress_stream(store, rx, run));
        assert!(next_within(&mut stream).await.is_some()); // snapshot
        assert!(next_within(&mut stream).await.is_some()); // terminal
        assert!(next_within(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn lagged_subscriber_still_closes_when_the_run_settled() {
        let mut run = RunRecord::new(RunInput::default());
        run.status = RunStatus::Running;
        let store = store_with(&run).await;
        let bus = ProgressBus::new();
        let rx = bus.subscribe();

        // The run settles, then a burst of events for another run
        // pushes the terminal event out of the channel buffer.
        let mut done = run.clone();
        done.status = RunStatus::Done;
        store.update(&done).await.unwrap();
        bus.publish(event_for(&done, PipelineStep::FinalizeArtifact, StepStatus::Done));
        let other = RunRecord::new(RunInput::default());
        for _ in 0..300 {
            bus.publish(event_for(&other, PipelineStep::ComputeKpis, StepStatus::Running));
        }

        let mut stream = Box::pin(progress_stream(store, rx, run));
        assert!(next_within(&mut stream).await.is_some()); // snapshot
        assert!(next_within(&mut stream).await.is_some()); // recovered terminal
        assert!(next_within(&mut stream).await.is_none());
    }
}
