//! CLI error types

use liftoff_types::LiftoffError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded or is incomplete
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Liftoff(#[from] LiftoffError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<CliError> for LiftoffError {
    fn from(err: CliError) -> Self {
        match err {
            CliError::Liftoff(e) => e,
            other => LiftoffError::InvalidConfiguration(other.to_string()),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
