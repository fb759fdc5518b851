//! Liftoff Engine - orchestrated pushes
//!
//! The [`Orchestrator`] sequences a run:
//!
//! 1. resolve the target and open a lazy connection
//! 2. reconcile requested services (fail-fast)
//! 3. stage the application bits where the push is issued from
//! 4. resolve manifests
//! 5. push each manifest under a time budget (partial failure)
//! 6. remove the staged copy
//!
//! Every step reports to a broadcast stream of
//! [`RunEventEnvelope`](liftoff_types::RunEventEnvelope)s and the run ends
//! in a [`RunReport`](liftoff_types::RunReport).

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cancel;
pub mod credentials;
pub mod events;
pub mod executor;
pub mod orchestrator;
pub mod reconciler;
pub mod staging;
pub mod validation;

pub use cancel::{CancelHandle, CancelSignal};
pub use credentials::{
    ChainedCredentialStore, CredentialStore, EnvCredentialStore, FileCredentialStore,
    StaticCredentialStore,
};
pub use events::RunEvents;
pub use executor::PushExecutor;
pub use orchestrator::{Orchestrator, PushConfig, DEFAULT_PUSH_TIMEOUT_SECS};
pub use reconciler::{ServiceReconciler, ServiceStep};
pub use staging::{
    AgentContext, Archiver, ArtifactStager, ExecutionContext, LocalContext, StagedArtifact,
    TarGzArchiver,
};
pub use validation::{test_connection, ConnectionTestRequest, ConnectionValidation};
