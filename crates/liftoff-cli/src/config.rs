//! Run configuration file
//!
//! Loaded through the `config` crate from a YAML, TOML or JSON file and
//! overlaid with `LIFTOFF_` environment variables (`__` separates nested
//! keys, e.g. `LIFTOFF_MANIFEST__SOURCE=inline`).

use crate::error::{CliError, CliResult};
use liftoff_engine::{
    ChainedCredentialStore, CredentialStore, EnvCredentialStore, FileCredentialStore, PushConfig,
    DEFAULT_PUSH_TIMEOUT_SECS,
};
use liftoff_platform::{ProxyPolicy, ProxySettings};
use liftoff_types::{LiftoffError, ManifestSource, ServiceRequest, DEFAULT_MANIFEST_PATH};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Fields of the inline manifest that are lists rather than scalars
const INLINE_LIST_FIELDS: [&str; 2] = ["env_vars", "service_names"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFile {
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub space: String,

    #[serde(default)]
    pub credentials_id: Option<String>,

    #[serde(default)]
    pub self_signed: bool,

    /// Seconds per push; zero selects the default
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub services: Vec<ServiceRequest>,

    /// Kept loosely typed until the `source` tag is checked
    #[serde(default)]
    pub manifest: Option<Value>,

    /// Falls back to `HTTPS_PROXY`/`NO_PROXY` when absent
    #[serde(default)]
    pub proxy: Option<ProxySettings>,

    /// Defaults to `<config dir>/liftoff/credentials.toml`
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_PUSH_TIMEOUT_SECS
}

impl RunFile {
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LIFTOFF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Map the loaded file onto a run
    pub fn push_config(&self) -> CliResult<PushConfig> {
        let target = self
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CliError::Config("no target configured".into()))?;
        let credentials_id = self
            .credentials_id
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CliError::Config("no credentials id configured".into()))?;

        let mut config = PushConfig::new(target, credentials_id, self.manifest_source()?);
        config.organization = self.organization.clone();
        config.space = self.space.clone();
        config.self_signed = self.self_signed;
        config.timeout_secs = self.timeout_secs;
        config.services = self.services.clone();
        Ok(config)
    }

    pub fn manifest_source(&self) -> CliResult<ManifestSource> {
        match &self.manifest {
            None => Ok(ManifestSource::file(DEFAULT_MANIFEST_PATH)),
            Some(value) => manifest_source(value),
        }
    }

    pub fn proxy_policy(&self) -> CliResult<ProxyPolicy> {
        Ok(match &self.proxy {
            Some(settings) => ProxyPolicy::new(Some(settings.clone()))?,
            None => ProxyPolicy::from_env()?,
        })
    }

    /// Environment first, then the credentials file
    pub fn credential_store(&self) -> CliResult<Arc<dyn CredentialStore>> {
        let file = match &self.credentials_file {
            Some(path) => FileCredentialStore::load(path)?,
            None => FileCredentialStore::load_default()?,
        };
        Ok(Arc::new(
            ChainedCredentialStore::new()
                .with(Arc::new(EnvCredentialStore::default()))
                .with(Arc::new(file)),
        ))
    }
}

/// Decode the `manifest` section.
///
/// The section comes from a loosely-typed source, so the tag is checked by
/// hand and scalar inline values written as numbers or booleans are read as
/// strings.
pub fn manifest_source(value: &Value) -> CliResult<ManifestSource> {
    let Value::Object(fields) = value else {
        return Err(invalid("the manifest section must be a map"));
    };

    let tag = match fields.get("source") {
        None => "manifest-file".to_string(),
        Some(Value::String(tag)) => tag.trim().to_ascii_lowercase(),
        Some(other) => return Err(invalid(&format!("unknown manifest source {}", other))),
    };

    let mut normalized = Map::new();
    for (key, field) in fields {
        let field = match field {
            Value::Number(n) if !INLINE_LIST_FIELDS.contains(&key.as_str()) => {
                Value::String(n.to_string())
            }
            Value::Bool(b) if !INLINE_LIST_FIELDS.contains(&key.as_str()) => {
                Value::String(b.to_string())
            }
            other => other.clone(),
        };
        normalized.insert(key.clone(), field);
    }

    match tag.as_str() {
        "manifest-file" | "inline" => {
            normalized.insert("source".into(), Value::String(tag));
            serde_json::from_value(Value::Object(normalized))
                .map_err(|e| invalid(&format!("invalid manifest section: {}", e)))
        }
        other => Err(invalid(&format!("unknown manifest source '{}'", other))),
    }
}

fn invalid(message: &str) -> CliError {
    CliError::Liftoff(LiftoffError::InvalidConfiguration(message.to_string()))
}
