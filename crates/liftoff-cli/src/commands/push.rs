//! `liftoff push`

use super::BuildContextArgs;
use crate::config::RunFile;
use crate::error::CliResult;
use crate::output::{self, print_event, print_info, OutputFormat};
use clap::Args;
use liftoff_engine::{
    AgentContext, CancelHandle, ExecutionContext, LocalContext, Orchestrator, TarGzArchiver,
};
use liftoff_manifest::ManifestResolver;
use liftoff_platform::cf::CfCliConnector;
use liftoff_platform::ConnectionFactory;
use liftoff_types::{PushOutcome, RunReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

#[derive(Debug, Args)]
pub struct PushArgs {
    #[command(flatten)]
    pub context: BuildContextArgs,

    /// Transfer the bits as if the workspace lived on a build agent
    #[arg(long)]
    pub remote_workspace: bool,

    /// Target endpoint, overriding the configuration file
    #[arg(short, long)]
    pub target: Option<String>,

    #[arg(long)]
    pub organization: Option<String>,

    #[arg(long)]
    pub space: Option<String>,

    /// Credential id to look up
    #[arg(long)]
    pub credentials: Option<String>,

    /// Seconds allowed per push (0 selects the default)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Accept a self-signed certificate on the target
    #[arg(long)]
    pub self_signed: bool,

    /// Path of the cf command-line client
    #[arg(long, env = "LIFTOFF_CF_BIN", default_value = "cf")]
    pub cf_bin: PathBuf,
}

impl PushArgs {
    fn apply(&self, run_file: &mut RunFile) {
        if let Some(target) = &self.target {
            run_file.target = Some(target.clone());
        }
        if let Some(organization) = &self.organization {
            run_file.organization = organization.clone();
        }
        if let Some(space) = &self.space {
            run_file.space = space.clone();
        }
        if let Some(credentials) = &self.credentials {
            run_file.credentials_id = Some(credentials.clone());
        }
        if let Some(timeout) = self.timeout {
            run_file.timeout_secs = timeout;
        }
        run_file.self_signed |= self.self_signed;
    }
}

#[derive(Debug, Serialize, Tabled)]
struct OutcomeRow {
    app: String,
    status: String,
    routes: String,
    error: String,
}

impl From<&PushOutcome> for OutcomeRow {
    fn from(outcome: &PushOutcome) -> Self {
        let status = match (&outcome.error_kind, outcome.succeeded) {
            (_, true) => "pushed".to_string(),
            (Some(kind), false) => kind.to_string(),
            (None, false) => "failed".to_string(),
        };
        Self {
            app: outcome.app_name.clone(),
            status,
            routes: outcome.discovered_routes.join(", "),
            error: outcome.error.clone().unwrap_or_default(),
        }
    }
}

pub async fn execute(args: PushArgs, mut run_file: RunFile, format: OutputFormat) -> CliResult<bool> {
    args.apply(&mut run_file);
    let config = run_file.push_config()?;
    let workspace = args.context.workspace()?;

    let connector = Arc::new(CfCliConnector::new(args.cf_bin.clone()));
    let orchestrator = Orchestrator::new(
        run_file.credential_store()?,
        ConnectionFactory::new(connector, run_file.proxy_policy()?),
        ManifestResolver::new(Arc::new(args.context.expander(&workspace))),
    );

    let mut events = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(envelope) => print_event(&envelope),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Log stream lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = CancelHandle::new();
    let signal = cancel.signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_info("Cancelling run...");
            cancel.cancel();
        }
    });

    let ctx: Box<dyn ExecutionContext> = if args.remote_workspace {
        Box::new(AgentContext::new(&workspace, Arc::new(TarGzArchiver)))
    } else {
        Box::new(LocalContext::new(&workspace))
    };

    let report = orchestrator.run(&config, ctx.as_ref(), &signal).await;
    interrupt.abort();
    drop(orchestrator);
    let _ = printer.await;

    print_report(&report, format)?;
    Ok(report.succeeded())
}

fn print_report(report: &RunReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            println!();
            output::print_output(report.outcomes.iter().map(OutcomeRow::from).collect(), format)
        }
        OutputFormat::Json | OutputFormat::Yaml => output::print_single(report, format),
    }
}
