//! Artifact staging
//!
//! A push is issued from the orchestrator's host, while the application bits
//! may live in a workspace on a remote build agent. Remote bits are archived
//! on the agent, written to a scratch directory here and unpacked. The
//! archive wraps its content in exactly one top-level entry, which becomes
//! the new artifact root.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use liftoff_manifest::ArtifactLocation;
use liftoff_types::{LiftoffError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

const SCRATCH_PREFIX: &str = "appDir";
const ARCHIVE_FILE: &str = "appFile";

/// Packs a directory or file into bytes and back
pub trait Archiver: Send + Sync {
    /// The result holds one top-level entry named after `source`
    fn archive(&self, source: &Path) -> io::Result<Vec<u8>>;

    fn unarchive(&self, bytes: &[u8], dest: &Path) -> io::Result<()>;
}

/// Gzip-compressed tarballs
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzArchiver;

impl Archiver for TarGzArchiver {
    fn archive(&self, source: &Path) -> io::Result<Vec<u8>> {
        let entry_name = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("workspace"));

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        if source.is_dir() {
            builder.append_dir_all(&entry_name, source)?;
        } else {
            builder.append_path_with_name(source, &entry_name)?;
        }
        builder.into_inner()?.finish()
    }

    fn unarchive(&self, bytes: &[u8], dest: &Path) -> io::Result<()> {
        tar::Archive::new(GzDecoder::new(bytes)).unpack(dest)
    }
}

/// Where the run's workspace lives
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// The workspace is on the same host that issues the push
    fn is_local(&self) -> bool;

    fn workspace_root(&self) -> &Path;

    /// Archive the workspace, or `sub_path` within it
    async fn archive(&self, sub_path: Option<&str>) -> Result<Vec<u8>>;
}

/// Workspace on the orchestrator's own filesystem
#[derive(Debug, Clone)]
pub struct LocalContext {
    root: PathBuf,
}

impl LocalContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ExecutionContext for LocalContext {
    fn is_local(&self) -> bool {
        true
    }

    fn workspace_root(&self) -> &Path {
        &self.root
    }

    async fn archive(&self, sub_path: Option<&str>) -> Result<Vec<u8>> {
        archive_blocking(Arc::new(TarGzArchiver), source_path(&self.root, sub_path)).await
    }
}

/// Workspace on a build agent, reached through its archiver
#[derive(Clone)]
pub struct AgentContext {
    root: PathBuf,
    archiver: Arc<dyn Archiver>,
}

impl AgentContext {
    pub fn new(root: impl Into<PathBuf>, archiver: Arc<dyn Archiver>) -> Self {
        Self {
            root: root.into(),
            archiver,
        }
    }
}

#[async_trait]
impl ExecutionContext for AgentContext {
    fn is_local(&self) -> bool {
        false
    }

    fn workspace_root(&self) -> &Path {
        &self.root
    }

    async fn archive(&self, sub_path: Option<&str>) -> Result<Vec<u8>> {
        archive_blocking(self.archiver.clone(), source_path(&self.root, sub_path)).await
    }
}

fn source_path(root: &Path, sub_path: Option<&str>) -> PathBuf {
    match sub_path {
        Some(sub) => root.join(sub.trim_start_matches(['/', '\\'])),
        None => root.to_path_buf(),
    }
}

async fn archive_blocking(archiver: Arc<dyn Archiver>, source: PathBuf) -> Result<Vec<u8>> {
    let display = source.display().to_string();
    tokio::task::spawn_blocking(move || archiver.archive(&source))
        .await
        .map_err(|e| LiftoffError::StagingCorrupted(format!("archiving task failed: {}", e)))?
        .map_err(|e| LiftoffError::StagingCorrupted(format!("cannot archive {}: {}", display, e)))
}

/// Application bits ready for the push
#[derive(Debug)]
pub struct StagedArtifact {
    root: PathBuf,
    /// Root already points at the application sub-path
    includes_app_path: bool,
    scratch: Option<TempDir>,
}

impl StagedArtifact {
    fn workspace(root: PathBuf) -> Self {
        Self {
            root,
            includes_app_path: false,
            scratch: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The bits are the workspace itself rather than a transferred copy
    pub fn is_workspace(&self) -> bool {
        self.scratch.is_none()
    }

    pub fn location(&self) -> ArtifactLocation {
        ArtifactLocation {
            root: self.root.clone(),
            app_path_applied: self.includes_app_path,
        }
    }

    /// Remove the transferred copy. Returns the removed path, if any.
    pub fn cleanup(self) -> io::Result<Option<PathBuf>> {
        match self.scratch {
            Some(scratch) => {
                let path = scratch.path().to_path_buf();
                scratch.close()?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}

pub struct ArtifactStager {
    archiver: Arc<dyn Archiver>,
}

impl Default for ArtifactStager {
    fn default() -> Self {
        Self::new(Arc::new(TarGzArchiver))
    }
}

impl ArtifactStager {
    pub fn new(archiver: Arc<dyn Archiver>) -> Self {
        Self { archiver }
    }

    /// Make the application bits available on this host.
    ///
    /// A local workspace is used in place.
    #[instrument(skip(self, ctx), fields(local = ctx.is_local()))]
    pub async fn stage(
        &self,
        ctx: &dyn ExecutionContext,
        app_sub_path: Option<&str>,
    ) -> Result<StagedArtifact> {
        if ctx.is_local() {
            return Ok(StagedArtifact::workspace(ctx.workspace_root().to_path_buf()));
        }

        let bytes = ctx.archive(app_sub_path).await?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map_err(|e| LiftoffError::StagingCorrupted(format!("cannot create scratch directory: {}", e)))?;
        let scratch_path = scratch.path().to_path_buf();
        debug!(scratch = %scratch_path.display(), bytes = bytes.len(), "Unpacking transferred bits");

        let archiver = self.archiver.clone();
        let dest = scratch_path.clone();
        tokio::task::spawn_blocking(move || unpack(archiver.as_ref(), &bytes, &dest))
            .await
            .map_err(|e| LiftoffError::StagingCorrupted(format!("unpacking task failed: {}", e)))??;

        let root = single_entry(&scratch_path)?;
        info!(root = %root.display(), "Staged application bits");
        Ok(StagedArtifact {
            root,
            includes_app_path: app_sub_path.is_some(),
            scratch: Some(scratch),
        })
    }
}

fn unpack(archiver: &dyn Archiver, bytes: &[u8], dest: &Path) -> Result<()> {
    let archive_file = dest.join(ARCHIVE_FILE);
    std::fs::write(&archive_file, bytes)
        .map_err(|e| LiftoffError::StagingCorrupted(format!("cannot write archive: {}", e)))?;
    archiver
        .unarchive(bytes, dest)
        .map_err(|e| LiftoffError::StagingCorrupted(format!("cannot unpack archive: {}", e)))?;
    if let Err(e) = std::fs::remove_file(&archive_file) {
        warn!(path = %archive_file.display(), error = %e, "Could not remove transferred archive");
    }
    Ok(())
}

/// The unpacked archive must hold exactly one top-level entry
fn single_entry(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| LiftoffError::StagingCorrupted(format!("cannot list {}: {}", dir.display(), e)))?
        .map(|entry| entry.map(|e| e.path()))
        .filter(|path| !matches!(path, Ok(p) if p.file_name().is_some_and(|n| n == ARCHIVE_FILE)))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| LiftoffError::StagingCorrupted(e.to_string()))?;

    match entries.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(LiftoffError::StagingCorrupted(format!(
            "expected exactly one top-level entry in {}, found {}",
            dir.display(),
            entries.len()
        ))),
    }
}
