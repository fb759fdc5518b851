//! Run event emission

use liftoff_types::{RunEvent, RunEventEnvelope, RunId};
use tokio::sync::broadcast;
use tracing::debug;

/// Emits the events of one run onto the orchestrator's broadcast channel
#[derive(Debug, Clone)]
pub struct RunEvents {
    run_id: RunId,
    tx: broadcast::Sender<RunEventEnvelope>,
}

impl RunEvents {
    pub fn new(run_id: RunId, tx: broadcast::Sender<RunEventEnvelope>) -> Self {
        Self { run_id, tx }
    }

    /// Detached emitter for callers that do not listen
    pub fn detached(run_id: RunId) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { run_id, tx }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn emit(&self, event: RunEvent) {
        debug!(run_id = %self.run_id, line = %event.to_line(), "Run event");
        let _ = self.tx.send(RunEventEnvelope::new(self.run_id, event));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(RunEvent::Warning {
            message: message.into(),
        });
    }
}
