//! Liftoff Types - Core types for orchestrated application pushes
//!
//! Liftoff drives the deployment of one or more applications onto a
//! multi-tenant PaaS control plane as a single unit of work inside a build
//! pipeline. This crate holds the vocabulary shared by every other crate.
//!
//! ## Key Concepts
//!
//! - **TargetSpec / ResolvedEndpoint**: where the control plane lives
//! - **ServiceRequest**: a backing service the applications expect to exist
//! - **ManifestSource**: either a manifest file or discrete inline fields
//! - **ResolvedManifest**: the fully merged, ready-to-push descriptor
//! - **PushOutcome / RunReport**: per-application and per-run results
//! - **RunEvent**: the operator-facing log stream of a run

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod events;
pub mod ids;
pub mod manifest;
pub mod outcome;
pub mod service;
pub mod target;

pub use error::{ErrorKind, FailureClass, LiftoffError, Result};
pub use events::{EventSeverity, RunEvent, RunEventEnvelope};
pub use ids::RunId;
pub use manifest::{EnvVar, InlineManifest, ManifestSource, ResolvedManifest, DEFAULT_MANIFEST_PATH};
pub use outcome::{PushOutcome, RunFailure, RunReport, ServiceActionRecord};
pub use service::{ServiceAction, ServiceInventoryEntry, ServiceRequest};
pub use target::{ResolvedEndpoint, Scheme, TargetSpec};
