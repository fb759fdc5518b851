//! Manifest sources and the resolved push descriptor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Manifest file looked up when a file source names no path
pub const DEFAULT_MANIFEST_PATH: &str = "manifest.yml";

/// Where the application descriptors of a run come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum ManifestSource {
    /// A manifest file inside the artifact, possibly describing many apps
    ManifestFile {
        #[serde(default = "default_manifest_path")]
        path: String,
    },
    /// Discrete fields describing exactly one app
    Inline(InlineManifest),
}

impl ManifestSource {
    pub fn file(path: impl Into<String>) -> Self {
        ManifestSource::ManifestFile { path: path.into() }
    }

    /// Workspace-relative sub-path holding the application bits, if any
    pub fn app_path(&self) -> Option<&str> {
        match self {
            ManifestSource::ManifestFile { .. } => None,
            ManifestSource::Inline(inline) => {
                Some(inline.path.as_str()).filter(|p| !p.trim().is_empty())
            }
        }
    }
}

fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

/// Environment variable declared on an inline manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Inline manifest fields, all raw strings prior to token expansion.
///
/// A blank scalar means "leave the platform default", never "set to empty".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_instances")]
    pub instances: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub no_route: String,
    /// Sub-path of the workspace holding the application bits
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub buildpack: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, alias = "hostname")]
    pub host: String,
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
    #[serde(default)]
    pub service_names: Vec<String>,
}

fn default_memory() -> String {
    "512".to_string()
}

fn default_instances() -> String {
    "1".to_string()
}

fn default_timeout() -> String {
    "60".to_string()
}

impl InlineManifest {
    /// Inline manifest with every optional field blank
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            memory: String::new(),
            instances: String::new(),
            timeout: String::new(),
            no_route: String::new(),
            path: String::new(),
            buildpack: String::new(),
            stack: String::new(),
            command: String::new(),
            domain: String::new(),
            host: String::new(),
            env_vars: Vec::new(),
            service_names: Vec::new(),
        }
    }
}

/// Fully merged, ready-to-push application descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedManifest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_quota_mb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u32>,
    /// `None` only when the source never mentioned routing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_route: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buildpack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    /// Fully-qualified routes, e.g. `app.example.com/path`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

impl ResolvedManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn routes_disabled(&self) -> bool {
        self.no_route.unwrap_or(false)
    }

    /// Whether the push has something to upload or run
    pub fn has_bits_location(&self) -> bool {
        self.path.is_some() || self.docker_image.is_some()
    }
}
