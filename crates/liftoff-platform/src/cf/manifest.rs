//! Rendering resolved manifests in the `cf push` manifest format

use liftoff_types::{LiftoffError, ResolvedManifest, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Serialize)]
struct CfManifestDocument {
    applications: Vec<CfApplication>,
}

#[derive(Debug, Serialize)]
struct CfDocker {
    image: String,
}

#[derive(Debug, Serialize)]
struct CfRoute {
    route: String,
}

#[derive(Debug, Serialize)]
struct CfApplication {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    docker: Option<CfDocker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_quota: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instances: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u32>,
    #[serde(rename = "no-route", skip_serializing_if = "Option::is_none")]
    no_route: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buildpacks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    routes: Vec<CfRoute>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    services: Vec<String>,
}

/// Render one application as a single-app manifest document
pub fn render(manifest: &ResolvedManifest) -> Result<String> {
    let document = CfManifestDocument {
        applications: vec![to_cf_application(manifest)?],
    };
    serde_yaml::to_string(&document)
        .map_err(|e| LiftoffError::ManifestInvalid(format!("cannot render manifest for '{}': {}", manifest.name, e)))
}

/// `cf push -f` reads `path:` relative to the manifest file, which lives in
/// the scratch `CF_HOME`, so only absolute paths are rendered.
fn to_cf_application(manifest: &ResolvedManifest) -> Result<CfApplication> {
    if let Some(path) = manifest.path.as_ref().filter(|p| !p.is_absolute()) {
        return Err(LiftoffError::ManifestInvalid(format!(
            "application bits path '{}' of '{}' must be absolute",
            path.display(),
            manifest.name
        )));
    }
    Ok(CfApplication {
        name: manifest.name.clone(),
        path: manifest.path.as_ref().map(|p| p.display().to_string()),
        docker: manifest
            .docker_image
            .as_ref()
            .map(|image| CfDocker { image: image.clone() }),
        memory: manifest.memory_mb.map(|mb| format!("{}M", mb)),
        disk_quota: manifest.disk_quota_mb.map(|mb| format!("{}M", mb)),
        instances: manifest.instances,
        timeout: manifest.timeout_secs,
        no_route: manifest.no_route,
        buildpacks: manifest.buildpack.iter().cloned().collect(),
        stack: manifest.stack.clone(),
        command: manifest.command.clone(),
        routes: compose_routes(manifest)
            .into_iter()
            .map(|route| CfRoute { route })
            .collect(),
        env: manifest.env.clone(),
        services: manifest.services.clone(),
    })
}

/// Explicit routes win; otherwise hosts and domains are combined, with the
/// application name standing in for a missing host.
fn compose_routes(manifest: &ResolvedManifest) -> Vec<String> {
    if manifest.routes_disabled() {
        return Vec::new();
    }
    if !manifest.routes.is_empty() {
        return manifest.routes.clone();
    }
    if manifest.domains.is_empty() {
        if !manifest.hosts.is_empty() {
            warn!(app = %manifest.name, "Hosts given without a domain, using the default route");
        }
        return Vec::new();
    }

    let hosts = if manifest.hosts.is_empty() {
        vec![manifest.name.clone()]
    } else {
        manifest.hosts.clone()
    };
    manifest
        .domains
        .iter()
        .flat_map(|domain| hosts.iter().map(move |host| format!("{}.{}", host, domain)))
        .collect()
}
