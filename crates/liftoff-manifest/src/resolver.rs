//! Dispatch over manifest sources

use crate::file::load_manifest_file;
use crate::merge::{inline_overrides, merge};
use crate::token::TokenExpander;
use liftoff_types::{LiftoffError, ManifestSource, ResolvedManifest, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Where the application bits were made available for the push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub root: PathBuf,
    /// The root already is the application sub-path, as after a transfer
    pub app_path_applied: bool,
}

impl ArtifactLocation {
    pub fn workspace(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            app_path_applied: false,
        }
    }

    pub fn transferred(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            app_path_applied: true,
        }
    }
}

/// Produces ready-to-push manifests from either source
#[derive(Clone)]
pub struct ManifestResolver {
    expander: Arc<dyn TokenExpander>,
}

impl ManifestResolver {
    pub fn new(expander: Arc<dyn TokenExpander>) -> Self {
        Self { expander }
    }

    pub fn expander(&self) -> &dyn TokenExpander {
        self.expander.as_ref()
    }

    /// Token-expand the inline application sub-path, if one is configured
    pub fn expanded_app_path(&self, source: &ManifestSource) -> Result<Option<String>> {
        match source.app_path() {
            None => Ok(None),
            Some(raw) => {
                let expanded = self
                    .expander
                    .expand(raw)
                    .map_err(|e| LiftoffError::TokenExpansion(e.to_string()))?;
                Ok(Some(expanded.trim().to_string()).filter(|p| !p.is_empty()))
            }
        }
    }

    #[instrument(skip(self, source), fields(root = %location.root.display()))]
    pub fn resolve(
        &self,
        source: &ManifestSource,
        location: &ArtifactLocation,
    ) -> Result<Vec<ResolvedManifest>> {
        let manifests = match source {
            ManifestSource::ManifestFile { path } => {
                load_manifest_file(path, self.expander.as_ref(), &location.root)?
            }
            ManifestSource::Inline(inline) => {
                let mut overrides = inline_overrides(inline, self.expander.as_ref())?;
                overrides.path = Some(self.inline_bits_path(source, location)?);
                let merged = merge(ResolvedManifest::default(), overrides);
                if merged.name.trim().is_empty() {
                    return Err(LiftoffError::ManifestInvalid(
                        "the application name is required".into(),
                    ));
                }
                vec![merged]
            }
        };

        for manifest in &manifests {
            debug!(app = %manifest.name, path = ?manifest.path, "Resolved manifest");
        }
        Ok(manifests)
    }

    fn inline_bits_path(&self, source: &ManifestSource, location: &ArtifactLocation) -> Result<PathBuf> {
        if location.app_path_applied {
            return Ok(location.root.clone());
        }
        Ok(match self.expanded_app_path(source)? {
            Some(sub_path) => join_relative(&location.root, &sub_path),
            None => location.root.clone(),
        })
    }
}

fn join_relative(root: &Path, sub_path: &str) -> PathBuf {
    root.join(sub_path.trim_start_matches(['/', '\\']))
}
