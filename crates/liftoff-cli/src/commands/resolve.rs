//! `liftoff resolve` - show the manifests a push would use, offline

use super::BuildContextArgs;
use crate::config::RunFile;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use clap::Args;
use liftoff_manifest::{ArtifactLocation, ManifestResolver};
use liftoff_types::ResolvedManifest;
use serde::Serialize;
use std::sync::Arc;
use tabled::Tabled;

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub context: BuildContextArgs,
}

#[derive(Debug, Serialize, Tabled)]
struct ManifestRow {
    name: String,
    path: String,
    memory: String,
    instances: String,
    routing: String,
    services: String,
}

impl From<&ResolvedManifest> for ManifestRow {
    fn from(m: &ResolvedManifest) -> Self {
        let path = match (&m.path, &m.docker_image) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(image)) => format!("docker://{}", image),
            (None, None) => "-".to_string(),
        };
        let routing = if m.routes_disabled() {
            "disabled".to_string()
        } else if !m.routes.is_empty() {
            m.routes.join(", ")
        } else if !m.hosts.is_empty() || !m.domains.is_empty() {
            format!("hosts: {} domains: {}", or_dash(&m.hosts), or_dash(&m.domains))
        } else {
            "default".to_string()
        };
        Self {
            name: m.name.clone(),
            path,
            memory: m.memory_mb.map(|mb| format!("{}M", mb)).unwrap_or_else(|| "-".into()),
            instances: m.instances.map(|i| i.to_string()).unwrap_or_else(|| "-".into()),
            routing,
            services: or_dash(&m.services),
        }
    }
}

fn or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

pub fn execute(args: ResolveArgs, run_file: RunFile, format: OutputFormat) -> CliResult<bool> {
    let workspace = args.context.workspace()?;
    let source = run_file.manifest_source()?;
    let resolver = ManifestResolver::new(Arc::new(args.context.expander(&workspace)));
    let manifests = resolver.resolve(&source, &ArtifactLocation::workspace(&workspace))?;

    match format {
        OutputFormat::Table => {
            output::print_output(manifests.iter().map(ManifestRow::from).collect(), format)?
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_single(&manifests, format)?,
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_summarizes_routing() {
        let mut manifest = ResolvedManifest::new("orders");
        manifest.path = Some("/ws/target/orders.jar".into());
        manifest.memory_mb = Some(1024);
        manifest.hosts = vec!["orders-v2".into()];
        let row = ManifestRow::from(&manifest);
        assert_eq!(row.memory, "1024M");
        assert_eq!(row.instances, "-");
        assert_eq!(row.routing, "hosts: orders-v2 domains: -");

        manifest.no_route = Some(true);
        assert_eq!(ManifestRow::from(&manifest).routing, "disabled");
    }

    #[test]
    fn test_resolve_file_manifest_from_workspace() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(
            ws.path().join("manifest.yml"),
            "applications:\n- name: orders-$BUILD\n  memory: 1G\n",
        )
        .unwrap();
        let args = ResolveArgs {
            context: BuildContextArgs {
                workspace: Some(ws.path().to_path_buf()),
                vars: vec![("BUILD".into(), "7".into())],
            },
        };
        assert!(execute(args, RunFile::default(), OutputFormat::Json).unwrap());
    }
}
