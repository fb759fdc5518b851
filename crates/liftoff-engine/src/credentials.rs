//! Credential lookup
//!
//! A credential id names a username/password pair held outside the run
//! configuration. Stores may restrict an entry to a target host.

use liftoff_platform::{Credentials, Secret};
use liftoff_types::{LiftoffError, ResolvedEndpoint, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Resolves a credential id for a target endpoint
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, id: &str, target: &ResolvedEndpoint) -> Option<Credentials>;
}

/// Fixed in-process credentials
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(id.into(), credentials);
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn lookup(&self, id: &str, _target: &ResolvedEndpoint) -> Option<Credentials> {
        self.entries.get(id).cloned()
    }
}

/// Reads `<PREFIX>_<ID>_USERNAME` and `<PREFIX>_<ID>_PASSWORD`.
///
/// The id is upper-cased and every non-alphanumeric character becomes `_`.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
    prefix: String,
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new("LIFTOFF_CREDENTIALS")
    }
}

impl EnvCredentialStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, id: &str, field: &str) -> String {
        let normalized: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}_{}", self.prefix, normalized, field)
    }
}

impl CredentialStore for EnvCredentialStore {
    fn lookup(&self, id: &str, _target: &ResolvedEndpoint) -> Option<Credentials> {
        let username = std::env::var(self.var_name(id, "USERNAME")).ok()?;
        let password = std::env::var(self.var_name(id, "PASSWORD")).ok()?;
        Some(Credentials::new(username, password))
    }
}

#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    credentials: HashMap<String, CredentialEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CredentialEntry {
    username: String,
    password: Secret,
    /// Host the entry is restricted to
    #[serde(default)]
    target: Option<String>,
}

/// Credentials from a TOML file:
///
/// ```toml
/// [credentials.deployer]
/// username = "ci-bot"
/// password = "..."
/// target = "api.example.com"
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileCredentialStore {
    entries: HashMap<String, CredentialEntry>,
}

impl FileCredentialStore {
    /// `<config dir>/liftoff/credentials.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("liftoff").join("credentials.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LiftoffError::InvalidConfiguration(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// A missing default file yields an empty store
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: CredentialsFile = toml::from_str(content).map_err(|e| {
            LiftoffError::InvalidConfiguration(format!("invalid credentials file: {}", e))
        })?;
        Ok(Self {
            entries: file.credentials,
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn lookup(&self, id: &str, target: &ResolvedEndpoint) -> Option<Credentials> {
        let entry = self.entries.get(id)?;
        if let Some(restricted) = &entry.target {
            if !restricted.eq_ignore_ascii_case(&target.host) {
                debug!(id, host = %target.host, "Credential entry restricted to another target");
                return None;
            }
        }
        Some(Credentials {
            username: entry.username.clone(),
            password: entry.password.clone(),
        })
    }
}

/// First store with an answer wins
#[derive(Clone, Default)]
pub struct ChainedCredentialStore {
    stores: Vec<Arc<dyn CredentialStore>>,
}

impl ChainedCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.stores.push(store);
        self
    }
}

impl CredentialStore for ChainedCredentialStore {
    fn lookup(&self, id: &str, target: &ResolvedEndpoint) -> Option<Credentials> {
        self.stores.iter().find_map(|s| s.lookup(id, target))
    }
}
