use tokio::sync::broadcast;

use woonrapport_common::ProgressEvent;

/// Fan-out bus for step transitions. The runner publishes after every
/// persisted transition; SSE subscribers filter by run id. Lagging or
/// absent subscribers never block the pipeline.
#[derive(Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn publish(&self, event: ProgressEvent) {
        // Send fails only when nobody is listening, which is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}
