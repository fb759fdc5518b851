//! Error taxonomy for push orchestration
//!
//! Every failure a run can report maps to exactly one [`ErrorKind`]. The kind's
//! `Display` is the human-readable category shown to operators so they can
//! tell configuration mistakes apart from connectivity problems and from
//! in-flight push failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classified failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedTarget,
    CredentialsMissing,
    /// Unknown host or network failure
    ConnectionUnreachable,
    /// Certificate rejected, typically a self-signed endpoint
    TlsUntrusted,
    AuthRejected,
    /// Carries platform status, code and description
    PlatformApiError,
    ManifestNotFound,
    ManifestInvalid,
    ServiceReconcileFailed,
    StagingCorrupted,
    PushTimeout,
    PushFailed,
    TokenExpansionFailed,
    Interrupted,
    /// Loosely-typed configuration could not be mapped onto a run
    InvalidConfiguration,
}

/// Coarse grouping of error kinds for operator triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Target, credentials, manifest or run configuration mistakes
    Configuration,
    /// Reachability, TLS and authentication problems
    Connectivity,
    /// Control plane rejected a request
    Platform,
    /// The push itself failed, timed out or was interrupted
    Push,
}

impl ErrorKind {
    /// Human-readable category
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::MalformedTarget => "malformed target",
            ErrorKind::CredentialsMissing => "credentials missing",
            ErrorKind::ConnectionUnreachable => "connection unreachable",
            ErrorKind::TlsUntrusted => "untrusted TLS certificate",
            ErrorKind::AuthRejected => "authentication rejected",
            ErrorKind::PlatformApiError => "platform API error",
            ErrorKind::ManifestNotFound => "manifest not found",
            ErrorKind::ManifestInvalid => "invalid manifest",
            ErrorKind::ServiceReconcileFailed => "service reconciliation failed",
            ErrorKind::StagingCorrupted => "artifact staging corrupted",
            ErrorKind::PushTimeout => "push timed out",
            ErrorKind::PushFailed => "push failed",
            ErrorKind::TokenExpansionFailed => "token expansion failed",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::InvalidConfiguration => "invalid configuration",
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            ErrorKind::MalformedTarget
            | ErrorKind::CredentialsMissing
            | ErrorKind::ManifestNotFound
            | ErrorKind::ManifestInvalid
            | ErrorKind::TokenExpansionFailed
            | ErrorKind::StagingCorrupted
            | ErrorKind::InvalidConfiguration => FailureClass::Configuration,
            ErrorKind::ConnectionUnreachable | ErrorKind::TlsUntrusted | ErrorKind::AuthRejected => {
                FailureClass::Connectivity
            }
            ErrorKind::PlatformApiError | ErrorKind::ServiceReconcileFailed => FailureClass::Platform,
            ErrorKind::PushTimeout | ErrorKind::PushFailed | ErrorKind::Interrupted => {
                FailureClass::Push
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Errors that can occur during a liftoff run
#[derive(Debug, Error)]
pub enum LiftoffError {
    #[error("malformed target '{target}': {reason}")]
    MalformedTarget { target: String, reason: String },

    #[error("no credentials have been given for id '{id}'")]
    CredentialsMissing { id: String },

    #[error("unknown host or unreachable endpoint: {0}")]
    ConnectionUnreachable(String),

    #[error("target's certificate is not verified: {0}")]
    TlsUntrusted(String),

    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    #[error(
        "platform error (status {}, code {}): {description}",
        status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string()),
        code.as_deref().unwrap_or("none")
    )]
    PlatformApi {
        status: Option<u16>,
        code: Option<String>,
        description: String,
    },

    #[error("manifest not found at {}: {reason}", path.display())]
    ManifestNotFound { path: PathBuf, reason: String },

    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("service '{service}' could not be {action}: {detail}")]
    ServiceReconcileFailed {
        service: String,
        action: String,
        detail: String,
    },

    #[error("staged artifact is corrupted: {0}")]
    StagingCorrupted(String),

    #[error("push of '{app}' exceeded the {seconds}s budget")]
    PushTimeout { app: String, seconds: u64 },

    #[error("push of '{app}' failed: {detail}")]
    PushFailed { app: String, detail: String },

    #[error("token expansion failed: {0}")]
    TokenExpansion(String),

    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl LiftoffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LiftoffError::MalformedTarget { .. } => ErrorKind::MalformedTarget,
            LiftoffError::CredentialsMissing { .. } => ErrorKind::CredentialsMissing,
            LiftoffError::ConnectionUnreachable(_) => ErrorKind::ConnectionUnreachable,
            LiftoffError::TlsUntrusted(_) => ErrorKind::TlsUntrusted,
            LiftoffError::AuthRejected(_) => ErrorKind::AuthRejected,
            LiftoffError::PlatformApi { .. } => ErrorKind::PlatformApiError,
            LiftoffError::ManifestNotFound { .. } => ErrorKind::ManifestNotFound,
            LiftoffError::ManifestInvalid(_) => ErrorKind::ManifestInvalid,
            LiftoffError::ServiceReconcileFailed { .. } => ErrorKind::ServiceReconcileFailed,
            LiftoffError::StagingCorrupted(_) => ErrorKind::StagingCorrupted,
            LiftoffError::PushTimeout { .. } => ErrorKind::PushTimeout,
            LiftoffError::PushFailed { .. } => ErrorKind::PushFailed,
            LiftoffError::TokenExpansion(_) => ErrorKind::TokenExpansionFailed,
            LiftoffError::Interrupted(_) => ErrorKind::Interrupted,
            LiftoffError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
        }
    }

    /// Connectivity-class errors raised lazily on first use of a connection
    pub fn is_connectivity(&self) -> bool {
        self.kind().class() == FailureClass::Connectivity
    }

    /// Operator-facing line: category first, then the verbatim detail
    pub fn report_line(&self) -> String {
        format!("[{}] {}", self.kind(), self)
    }
}

pub type Result<T> = std::result::Result<T, LiftoffError>;
