//! Liftoff CLI - orchestrated pushes from a build pipeline
//!
//! - `push`: reconcile services, stage the bits and push every manifest
//! - `test-connection`: reach the endpoint and report a classified result
//! - `check-target`: validate a target string offline
//! - `resolve`: print the manifests a push would use, offline

#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use liftoff_types::LiftoffError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

use commands::{check_target, push, resolve, test_connection};
use config::RunFile;
use error::CliResult;
use output::{LogFormat, OutputFormat};

#[derive(Parser)]
#[command(name = "liftoff")]
#[command(about = "Liftoff - push applications onto a PaaS as one unit of work", long_about = None)]
#[command(version)]
struct Cli {
    /// Run configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "LIFTOFF_CONFIG")]
    config: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    /// Diagnostic log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Diagnostic log format
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile services and push the configured applications
    Push(push::PushArgs),

    /// Check reachability and credentials of a target
    TestConnection(test_connection::TestConnectionArgs),

    /// Validate a target string without connecting
    CheckTarget(check_target::CheckTargetArgs),

    /// Resolve manifests against a workspace without connecting
    Resolve(resolve::ResolveArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    match run(cli).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output::print_error(&LiftoffError::from(e).report_line());
            std::process::exit(1);
        }
    }
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match cli.log_format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .without_time(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.context("failed to install the tracing subscriber")
}

async fn run(cli: Cli) -> CliResult<bool> {
    match cli.command {
        Commands::CheckTarget(args) => check_target::execute(args),
        command => {
            let run_file = RunFile::load(cli.config.as_deref())?;
            match command {
                Commands::Push(args) => push::execute(args, run_file, cli.output).await,
                Commands::TestConnection(args) => {
                    test_connection::execute(args, run_file, cli.output).await
                }
                Commands::Resolve(args) => resolve::execute(args, run_file, cli.output),
                Commands::CheckTarget(args) => check_target::execute(args),
            }
        }
    }
}
