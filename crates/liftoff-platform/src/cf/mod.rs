//! Driver for the Cloud Foundry command-line client
//!
//! Every connection gets its own scratch `CF_HOME`, so concurrent runs never
//! share login state. The session (api, auth, target) is opened lazily on
//! the first call and its failures are classified by [`diagnostics`].

pub mod diagnostics;
pub mod manifest;

use crate::cf::diagnostics::CommandScope;
use crate::client::{EndpointInfo, PlatformClient, Route};
use crate::connection::{ConnectionSettings, PlatformConnector};
use async_trait::async_trait;
use liftoff_types::{LiftoffError, ResolvedManifest, Result, ServiceInventoryEntry, ServiceRequest};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

static API_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^API version:\s*(\S+)").expect("api version pattern is valid"));

static LOG_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{4}-\d{2}-\d{2}T").expect("log entry pattern is valid"));

/// Connector spawning `cf` from a configurable binary path
#[derive(Debug, Clone)]
pub struct CfCliConnector {
    binary: PathBuf,
}

impl Default for CfCliConnector {
    fn default() -> Self {
        Self::new("cf")
    }
}

impl CfCliConnector {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PlatformConnector for CfCliConnector {
    fn connect(&self, settings: ConnectionSettings) -> Result<Arc<dyn PlatformClient>> {
        Ok(Arc::new(CfCliClient {
            binary: self.binary.clone(),
            settings,
            session: OnceCell::new(),
        }))
    }
}

struct CfSession {
    home: TempDir,
    api_output: String,
    space_guid: Option<String>,
}

pub struct CfCliClient {
    binary: PathBuf,
    settings: ConnectionSettings,
    session: OnceCell<CfSession>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    resources: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiErrors {
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    guid: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RouteResource {
    #[serde(default)]
    host: String,
    #[serde(default)]
    path: String,
    url: String,
    #[serde(default)]
    destinations: Vec<RouteDestination>,
}

#[derive(Debug, Deserialize)]
struct RouteDestination {
    app: DestinationApp,
}

#[derive(Debug, Deserialize)]
struct DestinationApp {
    guid: String,
}

impl CfCliClient {
    async fn session(&self) -> Result<&CfSession> {
        self.session.get_or_try_init(|| self.open_session()).await
    }

    #[instrument(skip(self), fields(endpoint = %self.settings.endpoint))]
    async fn open_session(&self) -> Result<CfSession> {
        let home = tempfile::Builder::new()
            .prefix("liftoff-cf-")
            .tempdir()
            .map_err(|e| LiftoffError::InvalidConfiguration(format!("cannot create CF_HOME: {}", e)))?;

        let api_url = self.settings.endpoint.api_url();
        let mut api_args = vec!["api", api_url.as_str()];
        if self.settings.self_signed {
            api_args.push("--skip-ssl-validation");
        }
        let api_output = self.run(home.path(), &api_args, &[], CommandScope::Session).await?;

        let mut space_guid = None;
        if let Some(credentials) = &self.settings.credentials {
            self.run(
                home.path(),
                &["auth"],
                &[
                    ("CF_USERNAME", credentials.username.as_str()),
                    ("CF_PASSWORD", credentials.password.expose()),
                ],
                CommandScope::Session,
            )
            .await?;

            let target = &self.settings.target;
            let mut target_args = vec!["target"];
            if let Some(org) = &target.organization {
                target_args.extend(["-o", org.as_str()]);
            }
            if let Some(space) = &target.space {
                target_args.extend(["-s", space.as_str()]);
            }
            if target_args.len() > 1 {
                self.run(home.path(), &target_args, &[], CommandScope::Session).await?;
            }

            if let Some(space) = &target.space {
                let guid = self
                    .run(home.path(), &["space", space.as_str(), "--guid"], &[], CommandScope::Session)
                    .await?;
                space_guid = Some(guid.trim().to_string());
            }
            info!(user = %credentials.username, "Authenticated against platform");
        }

        Ok(CfSession {
            home,
            api_output,
            space_guid,
        })
    }

    async fn run(
        &self,
        home: &Path,
        args: &[&str],
        extra_env: &[(&str, &str)],
        scope: CommandScope,
    ) -> Result<String> {
        debug!(command = %args.first().copied().unwrap_or_default(), "Running cf");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .env("CF_HOME", home)
            .env("CF_COLOR", "false")
            .env("CF_TRACE", "false")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in extra_env {
            cmd.env(key, value);
        }
        if let Some(proxy) = &self.settings.proxy {
            cmd.env("https_proxy", proxy.url()).env("HTTPS_PROXY", proxy.url());
        } else {
            cmd.env_remove("https_proxy").env_remove("HTTPS_PROXY");
        }

        let output = cmd.output().await.map_err(|e| {
            LiftoffError::InvalidConfiguration(format!(
                "cannot run '{}': {}",
                self.binary.display(),
                e
            ))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(diagnostics::classify(
            scope,
            output.status.code(),
            &format!("{}\n{}", stdout, stderr),
        ))
    }

    async fn run_in_session(&self, args: &[&str], scope: CommandScope) -> Result<String> {
        let session = self.session().await?;
        self.run(session.home.path(), args, &[], scope).await
    }

    async fn curl<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.run_in_session(&["curl", path], CommandScope::Session).await?;
        if let Ok(api_errors) = serde_json::from_str::<ApiErrors>(&body) {
            if let Some(first) = api_errors.errors.into_iter().next() {
                return Err(LiftoffError::PlatformApi {
                    status: None,
                    code: first.title,
                    description: first.detail,
                });
            }
        }
        serde_json::from_str(&body).map_err(|e| LiftoffError::PlatformApi {
            status: None,
            code: None,
            description: format!("unexpected response from {}: {}", path, e),
        })
    }

    async fn space_guid(&self) -> Result<String> {
        self.session()
            .await?
            .space_guid
            .clone()
            .ok_or_else(|| LiftoffError::InvalidConfiguration("no space is targeted".into()))
    }
}

#[async_trait]
impl PlatformClient for CfCliClient {
    async fn list_service_instances(&self) -> Result<Vec<ServiceInventoryEntry>> {
        let guid = self.space_guid().await?;
        let page: Page<NamedResource> = self
            .curl(&format!("/v3/service_instances?space_guids={}&per_page=5000", guid))
            .await?;
        Ok(page
            .resources
            .into_iter()
            .map(|r| ServiceInventoryEntry::new(r.name))
            .collect())
    }

    async fn create_service_instance(&self, request: &ServiceRequest) -> Result<()> {
        let args = [
            "create-service",
            request.service_type.as_str(),
            request.plan.as_str(),
            request.name.as_str(),
            "--wait",
        ];
        self.run_in_session(&args, CommandScope::Operation)
            .await
            .map(|_| ())
    }

    async fn delete_service_instance(&self, name: &str) -> Result<()> {
        self.run_in_session(&["delete-service", name, "-f", "--wait"], CommandScope::Operation)
            .await
            .map(|_| ())
    }

    async fn push_manifest(&self, manifest: &ResolvedManifest) -> Result<()> {
        let session = self.session().await?;
        let rendered = crate::cf::manifest::render(manifest)?;
        let manifest_path = session.home.path().join(format!("manifest-{}.yml", manifest.name));
        tokio::fs::write(&manifest_path, rendered).await.map_err(|e| {
            LiftoffError::InvalidConfiguration(format!("cannot write generated manifest: {}", e))
        })?;

        let manifest_arg = manifest_path.display().to_string();
        self.run(
            session.home.path(),
            &["push", "-f", manifest_arg.as_str()],
            &[],
            CommandScope::Operation,
        )
            .await
            .map(|_| ())
    }

    async fn list_routes(&self) -> Result<Vec<Route>> {
        let guid = self.space_guid().await?;
        let apps: Page<NamedResource> = self
            .curl(&format!("/v3/apps?space_guids={}&per_page=5000", guid))
            .await?;
        let names: HashMap<String, String> = apps.resources.into_iter().map(|a| (a.guid, a.name)).collect();

        let routes: Page<RouteResource> = self
            .curl(&format!("/v3/routes?space_guids={}&per_page=5000", guid))
            .await?;
        Ok(routes
            .resources
            .into_iter()
            .map(|r| {
                let apps = r
                    .destinations
                    .iter()
                    .filter_map(|d| names.get(&d.app.guid).cloned())
                    .collect();
                Route {
                    domain: domain_of(&r.url, &r.host, &r.path),
                    host: r.host,
                    path: r.path,
                    apps,
                }
            })
            .collect())
    }

    async fn fetch_recent_logs(&self, app_name: &str) -> Result<Vec<String>> {
        let output = self
            .run_in_session(&["logs", app_name, "--recent"], CommandScope::Operation)
            .await?;
        Ok(recent_log_lines(&output))
    }

    async fn get_endpoint_info(&self) -> Result<EndpointInfo> {
        let session = self.session().await?;
        let api_version = API_VERSION
            .captures(&session.api_output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        Ok(EndpointInfo {
            api_version,
            description: Some(format!("Cloud Foundry API at {}", self.settings.endpoint)),
            authenticated: self.settings.credentials.is_some(),
        })
    }
}

/// Log entries of `cf logs --recent`, without the banner printed before the
/// first timestamped line
fn recent_log_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|l| !LOG_ENTRY.is_match(l))
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Recover the domain from a v3 route url such as `host.domain/path`
fn domain_of(url: &str, host: &str, path: &str) -> String {
    let without_path = url.strip_suffix(path).unwrap_or(url);
    if host.is_empty() {
        return without_path.to_string();
    }
    without_path
        .strip_prefix(host)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(without_path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("web.apps.example.com", "web", ""), "apps.example.com");
        assert_eq!(domain_of("web.apps.example.com/v1", "web", "/v1"), "apps.example.com");
        assert_eq!(domain_of("example.com/docs", "", "/docs"), "example.com");
    }

    #[test]
    fn test_recent_logs_skip_banner() {
        let output = "Retrieving logs for app orders in org acme / space prod as deployer...\n\n   2026-10-16T09:12:01.44+0000 [API/0] OUT Updated app with guid 1f2e\n   2026-10-16T09:12:05.10+0000 [APP/PROC/WEB/0] OUT Started on port 8080\n      at com.acme.Orders.main(Orders.java:12)\n";
        let lines = recent_log_lines(output);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[API/0] OUT Updated app"));
        assert!(lines[2].ends_with("(Orders.java:12)"));

        assert!(recent_log_lines("Retrieving logs for app orders...\n\n").is_empty());
    }

    #[test]
    fn test_api_version_parsing() {
        let output = "Setting API endpoint to https://api.local...\nOK\n\nAPI endpoint:   https://api.local\nAPI version:    3.170.0\n";
        let version = API_VERSION
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        assert_eq!(version, Some("3.170.0"));
    }

    #[test]
    fn test_route_resource_parsing() {
        let body = r#"{"resources":[{"guid":"r1","host":"web","path":"","url":"web.apps.local","destinations":[{"guid":"d1","app":{"guid":"a1","process":{"type":"web"}}}]}]}"#;
        let page: Page<RouteResource> = serde_json::from_str(body).unwrap();
        assert_eq!(page.resources.len(), 1);
        assert_eq!(page.resources[0].destinations[0].app.guid, "a1");
    }

    #[test]
    fn test_api_errors_parsing() {
        let body = r#"{"errors":[{"code":10010,"title":"CF-ResourceNotFound","detail":"Space not found"}]}"#;
        let errors: ApiErrors = serde_json::from_str(body).unwrap();
        assert_eq!(errors.errors[0].title.as_deref(), Some("CF-ResourceNotFound"));
    }
}
