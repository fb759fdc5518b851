//! Liftoff Manifest - from configuration to ready-to-push descriptors
//!
//! Two sources feed a run:
//!
//! - a manifest file inside the artifact, which may describe many
//!   applications and is token-expanded line by line before parsing
//! - inline fields describing exactly one application, merged over
//!   defaults with "declared non-blank wins" semantics via [`merge`]
//!
//! Both paths end in [`ResolvedManifest`] values whose application bits
//! location is always set unless a container image is given.
//!
//! [`ResolvedManifest`]: liftoff_types::ResolvedManifest

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod file;
pub mod merge;
pub mod resolver;
pub mod token;
pub mod units;

pub use error::ManifestError;
pub use merge::{inline_overrides, merge, ManifestOverrides};
pub use resolver::{ArtifactLocation, ManifestResolver};
pub use token::{BuildContextExpander, TokenError, TokenExpander};
pub use units::{parse_count, parse_memory_mb};
