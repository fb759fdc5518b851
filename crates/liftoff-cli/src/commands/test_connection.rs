//! `liftoff test-connection`

use crate::config::RunFile;
use crate::error::{CliError, CliResult};
use crate::output::{self, print_error, print_success, print_warning, OutputFormat};
use clap::Args;
use liftoff_engine::{test_connection, ConnectionTestRequest, ConnectionValidation};
use liftoff_platform::cf::CfCliConnector;
use liftoff_platform::ConnectionFactory;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct TestConnectionArgs {
    /// Target endpoint (defaults to the configured one)
    pub target: Option<String>,

    /// Credential id; without it only reachability is checked
    #[arg(long)]
    pub credentials: Option<String>,

    #[arg(long)]
    pub organization: Option<String>,

    #[arg(long)]
    pub space: Option<String>,

    /// Accept a self-signed certificate on the target
    #[arg(long)]
    pub self_signed: bool,

    /// Path of the cf command-line client
    #[arg(long, env = "LIFTOFF_CF_BIN", default_value = "cf")]
    pub cf_bin: PathBuf,
}

impl TestConnectionArgs {
    fn request(&self, run_file: &RunFile) -> CliResult<ConnectionTestRequest> {
        let target = self
            .target
            .clone()
            .or_else(|| run_file.target.clone())
            .ok_or_else(|| CliError::InvalidInput("a target is required".into()))?;
        Ok(ConnectionTestRequest {
            target: target.as_str().into(),
            credentials_id: self.credentials.clone().or_else(|| run_file.credentials_id.clone()),
            organization: self
                .organization
                .clone()
                .unwrap_or_else(|| run_file.organization.clone()),
            space: self.space.clone().unwrap_or_else(|| run_file.space.clone()),
            self_signed: self.self_signed || run_file.self_signed,
        })
    }
}

pub async fn execute(args: TestConnectionArgs, run_file: RunFile, format: OutputFormat) -> CliResult<bool> {
    let request = args.request(&run_file)?;
    let factory = ConnectionFactory::new(
        Arc::new(CfCliConnector::new(args.cf_bin.clone())),
        run_file.proxy_policy()?,
    );
    let store = run_file.credential_store()?;

    let validation = test_connection(&request, &factory, store.as_ref()).await;

    if !matches!(format, OutputFormat::Table) {
        output::print_single(&validation, format)?;
        return Ok(!validation.is_error());
    }

    match &validation {
        ConnectionValidation::Ok { api_version } => match api_version {
            Some(version) => print_success(&format!("Connection OK (API version {})", version)),
            None => print_success("Connection OK"),
        },
        ConnectionValidation::Warning { messages } => {
            print_success("Connection OK");
            for message in messages {
                print_warning(message);
            }
        }
        ConnectionValidation::Error { kind, message } => {
            print_error(&format!("[{}] {}", kind, message));
        }
    }
    Ok(!validation.is_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(target: Option<&str>) -> TestConnectionArgs {
        TestConnectionArgs {
            target: target.map(str::to_string),
            credentials: None,
            organization: None,
            space: None,
            self_signed: false,
            cf_bin: "cf".into(),
        }
    }

    #[test]
    fn test_request_falls_back_to_config() {
        let run_file = RunFile {
            target: Some("api.example.com".into()),
            credentials_id: Some("cf-prod".into()),
            self_signed: true,
            ..Default::default()
        };
        let request = args(None).request(&run_file).unwrap();
        assert_eq!(request.target.as_str(), "api.example.com");
        assert_eq!(request.credentials_id.as_deref(), Some("cf-prod"));
        assert!(request.self_signed);

        let request = args(Some("api.other.com")).request(&run_file).unwrap();
        assert_eq!(request.target.as_str(), "api.other.com");
    }

    #[test]
    fn test_target_is_required() {
        assert!(args(None).request(&RunFile::default()).is_err());
    }
}
