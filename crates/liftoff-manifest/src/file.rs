//! Manifest file loading
//!
//! The file is token-expanded line by line, then parsed. Top-level keys are
//! inherited by every application that does not set them. Applications
//! without a path or container image default to the artifact root.

use crate::error::{ManifestError, Result};
use crate::token::TokenExpander;
use crate::units::parse_memory_mb;
use liftoff_types::{ResolvedManifest, DEFAULT_MANIFEST_PATH};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct ManifestDocument {
    #[serde(default)]
    applications: Vec<RawApplication>,
    #[serde(flatten)]
    shared: RawApplication,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawApplication {
    name: Option<String>,
    path: Option<String>,
    docker: Option<RawDocker>,
    memory: Option<Scalar>,
    disk_quota: Option<Scalar>,
    instances: Option<Scalar>,
    timeout: Option<Scalar>,
    #[serde(rename = "no-route")]
    no_route: Option<bool>,
    buildpack: Option<String>,
    buildpacks: Option<Vec<String>>,
    stack: Option<String>,
    command: Option<String>,
    domain: Option<String>,
    domains: Option<Vec<String>>,
    host: Option<String>,
    hosts: Option<Vec<String>>,
    routes: Option<Vec<RawRoute>>,
    env: Option<BTreeMap<String, serde_yaml::Value>>,
    services: Option<Vec<RawService>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDocker {
    image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRoute {
    route: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawService {
    Name(String),
    Named { name: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

impl RawApplication {
    fn inherit(self, shared: &RawApplication) -> RawApplication {
        let mut env = shared.env.clone().unwrap_or_default();
        let has_env = self.env.is_some() || shared.env.is_some();
        env.extend(self.env.unwrap_or_default());

        RawApplication {
            name: self.name.or_else(|| shared.name.clone()),
            path: self.path.or_else(|| shared.path.clone()),
            docker: self.docker.or_else(|| shared.docker.clone()),
            memory: self.memory.or_else(|| shared.memory.clone()),
            disk_quota: self.disk_quota.or_else(|| shared.disk_quota.clone()),
            instances: self.instances.or_else(|| shared.instances.clone()),
            timeout: self.timeout.or_else(|| shared.timeout.clone()),
            no_route: self.no_route.or(shared.no_route),
            buildpack: self.buildpack.or_else(|| shared.buildpack.clone()),
            buildpacks: self.buildpacks.or_else(|| shared.buildpacks.clone()),
            stack: self.stack.or_else(|| shared.stack.clone()),
            command: self.command.or_else(|| shared.command.clone()),
            domain: self.domain.or_else(|| shared.domain.clone()),
            domains: self.domains.or_else(|| shared.domains.clone()),
            host: self.host.or_else(|| shared.host.clone()),
            hosts: self.hosts.or_else(|| shared.hosts.clone()),
            routes: self.routes.or_else(|| shared.routes.clone()),
            env: has_env.then_some(env),
            services: self.services.or_else(|| shared.services.clone()),
        }
    }

    fn resolve(self, manifest_dir: &Path, artifact_root: &Path) -> Result<ResolvedManifest> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ManifestError::Invalid("every application needs a name".into()))?;

        let docker_image = self.docker.and_then(|d| d.image).filter(|i| !i.trim().is_empty());
        let path = match self.path.filter(|p| !p.trim().is_empty()) {
            Some(p) => Some(manifest_dir.join(p)),
            None if docker_image.is_none() => Some(artifact_root.to_path_buf()),
            None => None,
        };

        let memory_mb = self
            .memory
            .map(|m| parse_memory_mb(&m.as_text()))
            .transpose()?;
        let disk_quota_mb = self
            .disk_quota
            .map(|m| parse_memory_mb(&m.as_text()))
            .transpose()?;
        let instances = self.instances.map(|v| scalar_count("instances", &v)).transpose()?;
        let timeout_secs = self.timeout.map(|v| scalar_count("timeout", &v)).transpose()?;

        let buildpack = self
            .buildpack
            .or_else(|| self.buildpacks.and_then(|b| b.into_iter().next()));
        let domains = self
            .domain
            .into_iter()
            .chain(self.domains.unwrap_or_default())
            .collect();
        let hosts = self
            .host
            .into_iter()
            .chain(self.hosts.unwrap_or_default())
            .collect();
        let routes = self
            .routes
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.route)
            .collect();
        let env = self
            .env
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, yaml_scalar_to_string(v)))
            .collect();
        let services = self
            .services
            .unwrap_or_default()
            .into_iter()
            .map(|s| match s {
                RawService::Name(name) | RawService::Named { name } => name,
            })
            .collect();

        Ok(ResolvedManifest {
            name,
            path,
            docker_image,
            memory_mb,
            disk_quota_mb,
            instances,
            timeout_secs,
            no_route: self.no_route,
            buildpack,
            stack: self.stack,
            command: self.command,
            domains,
            hosts,
            routes,
            env,
            services,
        })
    }
}

fn scalar_count(field: &'static str, value: &Scalar) -> Result<u32> {
    let text = value.as_text();
    text.trim()
        .parse::<u32>()
        .map_err(|_| ManifestError::InvalidValue { field, value: text })
}

fn yaml_scalar_to_string(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s,
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Locate the manifest file for a configured (already expanded) path
pub fn manifest_file_path(configured: &str, artifact_root: &Path) -> PathBuf {
    let configured = configured.trim();
    let configured = if configured.is_empty() {
        DEFAULT_MANIFEST_PATH
    } else {
        configured
    };
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        artifact_root.join(path)
    }
}

/// Parse expanded manifest text
pub fn parse_manifest(
    text: &str,
    manifest_path: &Path,
    artifact_root: &Path,
) -> Result<Vec<ResolvedManifest>> {
    let document: ManifestDocument =
        serde_yaml::from_str(text).map_err(|e| ManifestError::Parse {
            path: manifest_path.to_path_buf(),
            message: e.to_string(),
        })?;

    let manifest_dir = manifest_path.parent().unwrap_or(artifact_root);
    let ManifestDocument {
        applications,
        shared,
    } = document;

    let applications = if applications.is_empty() {
        if shared.name.is_none() {
            return Err(ManifestError::NoApplications {
                path: manifest_path.to_path_buf(),
            });
        }
        vec![RawApplication::default()]
    } else {
        applications
    };

    applications
        .into_iter()
        .map(|app| app.inherit(&shared).resolve(manifest_dir, artifact_root))
        .collect()
}

/// Load, expand and parse a manifest file
pub fn load_manifest_file(
    configured_path: &str,
    expander: &dyn TokenExpander,
    artifact_root: &Path,
) -> Result<Vec<ResolvedManifest>> {
    let expanded_path = expander.expand(configured_path)?;
    let manifest_path = manifest_file_path(&expanded_path, artifact_root);
    debug!(path = %manifest_path.display(), "Loading manifest file");

    let raw = std::fs::read_to_string(&manifest_path).map_err(|source| ManifestError::NotFound {
        path: manifest_path.clone(),
        source,
    })?;

    let mut expanded = String::with_capacity(raw.len());
    for line in raw.lines() {
        expanded.push_str(&expander.expand(line)?);
        expanded.push('\n');
    }

    parse_manifest(&expanded, &manifest_path, artifact_root)
}
