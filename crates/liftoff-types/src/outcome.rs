//! Per-application and per-run results

use crate::{ErrorKind, LiftoffError, RunId, ServiceAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of pushing one resolved manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub app_name: String,
    pub succeeded: bool,
    pub discovered_routes: Vec<String>,
    pub error_kind: Option<ErrorKind>,
    /// Verbatim failure detail
    pub error: Option<String>,
    /// Recorded but never flips `succeeded`
    pub route_lookup_error: Option<String>,
    pub log_lines: usize,
}

impl PushOutcome {
    pub fn success(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            succeeded: true,
            discovered_routes: Vec::new(),
            error_kind: None,
            error: None,
            route_lookup_error: None,
            log_lines: 0,
        }
    }

    pub fn failure(app_name: impl Into<String>, err: &LiftoffError) -> Self {
        Self {
            succeeded: false,
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
            ..Self::success(app_name)
        }
    }
}

/// What happened to one requested service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceActionRecord {
    pub name: String,
    pub action: ServiceAction,
}

/// Run-level failure that stopped the run before or between pushes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LiftoffError> for RunFailure {
    fn from(err: &LiftoffError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Aggregated result of one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub services: Vec<ServiceActionRecord>,
    pub outcomes: Vec<PushOutcome>,
    pub failure: Option<RunFailure>,
}

impl RunReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            services: Vec::new(),
            outcomes: Vec::new(),
            failure: None,
        }
    }

    /// True only when nothing aborted the run and every push succeeded
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
            && !self.outcomes.is_empty()
            && self.outcomes.iter().all(|o| o.succeeded)
    }

    pub fn failed_apps(&self) -> impl Iterator<Item = &PushOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .flat_map(|o| o.discovered_routes.iter().map(String::as_str))
    }

    /// Kind that best explains a failed run
    pub fn primary_error_kind(&self) -> Option<ErrorKind> {
        self.failure
            .as_ref()
            .map(|f| f.kind)
            .or_else(|| self.failed_apps().find_map(|o| o.error_kind))
    }
}
