//! Liftoff Platform - the PaaS capability surface
//!
//! This crate is the only place that knows how to talk to a control plane.
//! It provides:
//!
//! - [`endpoint`]: parsing loosely-formatted targets into a [`ResolvedEndpoint`]
//! - [`proxy`]: the injected proxy policy with no-proxy host patterns
//! - [`connection`]: the factory that binds endpoint, credentials and proxy
//!   into a lazily-connected [`ConnectionHandle`]
//! - [`PlatformClient`]: the operations a run consumes
//! - [`InMemoryPlatform`]: a scriptable platform for tests and dry runs
//! - [`cf`]: a driver for the Cloud Foundry command-line client
//!
//! [`ResolvedEndpoint`]: liftoff_types::ResolvedEndpoint

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cf;
pub mod client;
pub mod connection;
pub mod endpoint;
pub mod memory;
pub mod proxy;

pub use client::{EndpointInfo, PlatformClient, Route};
pub use connection::{
    ConnectionFactory, ConnectionHandle, ConnectionSettings, Credentials, PlatformConnector,
    Secret, SpaceTarget,
};
pub use endpoint::{resolve_target, target_warnings, validate_target};
pub use memory::{InMemoryConnector, InMemoryPlatform, PlatformCall};
pub use proxy::{ProxyDescriptor, ProxyPolicy, ProxySettings};
