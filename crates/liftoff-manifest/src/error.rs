//! Manifest resolution errors

use crate::token::TokenError;
use liftoff_types::LiftoffError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse manifest {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{field} must be an integer, got '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),

    #[error("manifest {} declares no applications", path.display())]
    NoApplications { path: PathBuf },

    #[error(transparent)]
    Token(#[from] TokenError),
}

pub type Result<T> = std::result::Result<T, ManifestError>;

impl From<ManifestError> for LiftoffError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::NotFound { path, source } => LiftoffError::ManifestNotFound {
                path,
                reason: source.to_string(),
            },
            ManifestError::Token(token) => LiftoffError::TokenExpansion(token.to_string()),
            other => LiftoffError::ManifestInvalid(other.to_string()),
        }
    }
}
