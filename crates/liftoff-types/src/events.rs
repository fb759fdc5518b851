//! Run events
//!
//! Events form the human-readable log stream of a run. Every event renders
//! to a single operator-facing line.

use crate::{ErrorKind, RunId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every run event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEventEnvelope {
    pub id: Uuid,
    pub run_id: RunId,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub severity: EventSeverity,
    pub event: RunEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEvent {
    Connected {
        endpoint: String,
        proxied: bool,
    },
    ServiceCreating {
        name: String,
        service_type: String,
        plan: String,
    },
    ServiceSkipped {
        name: String,
    },
    ServiceResetting {
        name: String,
    },
    ServiceDeleted {
        name: String,
    },
    ArtifactStaged {
        path: String,
        transferred: bool,
    },
    ArtifactCleaned {
        path: String,
    },
    ManifestResolved {
        app: String,
    },
    PushStarted {
        app: String,
    },
    PushSucceeded {
        app: String,
    },
    PushFailed {
        app: String,
        kind: ErrorKind,
        reason: String,
    },
    /// One line of recent staging or runtime output
    AppLog {
        app: String,
        line: String,
    },
    RouteDiscovered {
        app: String,
        url: String,
    },
    Warning {
        message: String,
    },
    RunFailed {
        kind: ErrorKind,
        reason: String,
    },
    RunCompleted {
        succeeded: bool,
        pushed: usize,
        failed: usize,
    },
}

impl RunEvent {
    pub fn to_line(&self) -> String {
        match self {
            RunEvent::Connected { endpoint, proxied } => {
                if *proxied {
                    format!("Targeting {} through proxy", endpoint)
                } else {
                    format!("Targeting {}", endpoint)
                }
            }
            RunEvent::ServiceCreating { name, .. } => format!("Creating service {}", name),
            RunEvent::ServiceSkipped { name } => {
                format!("Service {} already exists, skipping creation.", name)
            }
            RunEvent::ServiceResetting { name } => {
                format!("Service {} already exists, resetting.", name)
            }
            RunEvent::ServiceDeleted { name } => format!("Service {} deleted.", name),
            RunEvent::ArtifactStaged { path, transferred } => {
                if *transferred {
                    format!("Transferred application bits to {}", path)
                } else {
                    format!("Using workspace {}", path)
                }
            }
            RunEvent::ArtifactCleaned { path } => format!("Removed staged copy {}", path),
            RunEvent::ManifestResolved { app } => format!("Resolved manifest for {}", app),
            RunEvent::PushStarted { app } => format!("Pushing {}", app),
            RunEvent::PushSucceeded { app } => format!("Pushed {}", app),
            RunEvent::PushFailed { app, kind, reason } => {
                format!("ERROR: [{}] {}: {}", kind, app, reason)
            }
            RunEvent::AppLog { app, line } => format!("[{}] {}", app, line),
            RunEvent::RouteDiscovered { app, url } => {
                format!("Application {} is available at {}", app, url)
            }
            RunEvent::Warning { message } => format!("WARNING: {}", message),
            RunEvent::RunFailed { kind, reason } => format!("ERROR: [{}] {}", kind, reason),
            RunEvent::RunCompleted {
                succeeded,
                pushed,
                failed,
            } => {
                if *succeeded {
                    format!("Push complete: {} application(s) pushed", pushed)
                } else {
                    format!("Push failed: {} pushed, {} failed", pushed, failed)
                }
            }
        }
    }

    fn infer_severity(&self) -> EventSeverity {
        match self {
            RunEvent::PushFailed { .. } | RunEvent::RunFailed { .. } => EventSeverity::Error,
            RunEvent::RunCompleted { succeeded: false, .. } => EventSeverity::Error,
            RunEvent::Warning { .. } => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}

impl RunEventEnvelope {
    pub fn new(run_id: RunId, event: RunEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            timestamp: chrono::Utc::now(),
            severity: event.infer_severity(),
            event,
        }
    }
}
