//! CLI command implementations
//!
//! Every command returns `Ok(false)` when it ran to completion but the
//! operator should see a failing exit status.

pub mod check_target;
pub mod push;
pub mod resolve;
pub mod test_connection;

use clap::Args;
use liftoff_manifest::BuildContextExpander;
use std::path::PathBuf;

/// Build context shared by commands that expand tokens
#[derive(Debug, Clone, Args)]
pub struct BuildContextArgs {
    /// Build workspace holding the application bits (defaults to the current directory)
    #[arg(short, long, env = "WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Build variable available to token expansion, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

impl BuildContextArgs {
    /// Absolute workspace path; relative paths resolve against the current directory
    pub fn workspace(&self) -> std::io::Result<PathBuf> {
        match &self.workspace {
            Some(path) => std::path::absolute(path),
            None => std::env::current_dir(),
        }
    }

    /// Process environment, then `WORKSPACE`, then `--var` flags
    pub fn expander(&self, workspace: &std::path::Path) -> BuildContextExpander {
        BuildContextExpander::new()
            .with_process_env()
            .with_var("WORKSPACE", workspace.display().to_string())
            .with_vars(self.vars.iter().cloned())
    }
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}
