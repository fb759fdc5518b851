//! In-memory platform for development and testing
//!
//! Keeps services, pushed applications, routes and logs in memory, records
//! every call in a journal and lets callers inject failures and delays.

use crate::client::{EndpointInfo, PlatformClient, Route};
use crate::connection::{ConnectionSettings, Credentials, PlatformConnector};
use async_trait::async_trait;
use dashmap::DashMap;
use liftoff_types::{
    ErrorKind, LiftoffError, ResolvedManifest, Result, ServiceInventoryEntry, ServiceRequest,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call observed by the in-memory platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ListServices,
    CreateService { name: String, service_type: String, plan: String },
    DeleteService { name: String },
    Push { app: String },
    ListRoutes,
    FetchLogs { app: String },
    EndpointInfo,
}

impl PlatformCall {
    /// Whether the call changes platform state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            PlatformCall::CreateService { .. } | PlatformCall::DeleteService { .. } | PlatformCall::Push { .. }
        )
    }
}

#[derive(Debug)]
pub struct InMemoryPlatform {
    services: DashMap<String, ServiceRequest>,
    pushed: DashMap<String, ResolvedManifest>,
    routes: Mutex<Vec<Route>>,
    logs: DashMap<String, Vec<String>>,
    journal: Mutex<Vec<PlatformCall>>,
    default_domain: Option<String>,
    expected_credentials: Option<Credentials>,
    connection_failure: Mutex<Option<ErrorKind>>,
    push_failures: DashMap<String, String>,
    push_delays: DashMap<String, Duration>,
    service_failures: DashMap<String, String>,
    route_failure: Mutex<Option<String>>,
    log_failure: Mutex<Option<String>>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            pushed: DashMap::new(),
            routes: Mutex::new(Vec::new()),
            logs: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            default_domain: None,
            expected_credentials: None,
            connection_failure: Mutex::new(None),
            push_failures: DashMap::new(),
            push_delays: DashMap::new(),
            service_failures: DashMap::new(),
            route_failure: Mutex::new(None),
            log_failure: Mutex::new(None),
        }
    }

    /// Pushed apps that keep routing get `<host>.<domain>` assigned
    pub fn with_default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = Some(domain.into());
        self
    }

    /// Sessions presenting other credentials are rejected
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.expected_credentials = Some(credentials);
        self
    }

    pub fn seed_service(&self, name: &str, service_type: &str, plan: &str) {
        self.services
            .insert(name.to_string(), ServiceRequest::new(name, service_type, plan));
    }

    pub fn add_route(&self, route: Route) {
        lock(&self.routes).push(route);
    }

    pub fn add_logs(&self, app: &str, lines: &[&str]) {
        self.logs
            .entry(app.to_string())
            .or_default()
            .extend(lines.iter().map(|l| l.to_string()));
    }

    /// Every call fails with a connectivity error of `kind`
    pub fn fail_connections(&self, kind: ErrorKind) {
        *lock(&self.connection_failure) = Some(kind);
    }

    pub fn fail_push(&self, app: &str, description: &str) {
        self.push_failures.insert(app.to_string(), description.to_string());
    }

    pub fn delay_push(&self, app: &str, delay: Duration) {
        self.push_delays.insert(app.to_string(), delay);
    }

    pub fn fail_service(&self, name: &str, description: &str) {
        self.service_failures.insert(name.to_string(), description.to_string());
    }

    pub fn fail_routes(&self, description: &str) {
        *lock(&self.route_failure) = Some(description.to_string());
    }

    pub fn fail_logs(&self, description: &str) {
        *lock(&self.log_failure) = Some(description.to_string());
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.journal).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.journal).clear();
    }

    pub fn service(&self, name: &str) -> Option<ServiceRequest> {
        self.services.get(name).map(|s| s.clone())
    }

    pub fn pushed(&self, app: &str) -> Option<ResolvedManifest> {
        self.pushed.get(app).map(|m| m.clone())
    }

    pub fn pushed_count(&self) -> usize {
        self.pushed.len()
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.journal).push(call);
    }

    fn check_session(&self, presented: Option<&Credentials>) -> Result<()> {
        if let Some(kind) = *lock(&self.connection_failure) {
            return Err(connectivity_error(kind));
        }
        match (&self.expected_credentials, presented) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            (Some(_), Some(given)) => Err(LiftoffError::AuthRejected(format!(
                "Credentials were rejected for user '{}'",
                given.username
            ))),
            _ => Ok(()),
        }
    }

    fn require_login(presented: Option<&Credentials>) -> Result<()> {
        if presented.is_none() {
            return Err(LiftoffError::AuthRejected("Not logged in".into()));
        }
        Ok(())
    }

    fn assign_default_route(&self, manifest: &ResolvedManifest) {
        let Some(default_domain) = &self.default_domain else {
            return;
        };
        if manifest.routes_disabled() {
            return;
        }
        let mut routes = lock(&self.routes);
        if routes.iter().any(|r| r.serves(&manifest.name)) {
            return;
        }
        let host = manifest.hosts.first().cloned().unwrap_or_else(|| manifest.name.clone());
        let domain = manifest
            .domains
            .first()
            .cloned()
            .unwrap_or_else(|| default_domain.clone());
        routes.push(Route::new(host, domain).bound_to(manifest.name.clone()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn connectivity_error(kind: ErrorKind) -> LiftoffError {
    match kind {
        ErrorKind::TlsUntrusted => LiftoffError::TlsUntrusted("certificate signed by unknown authority".into()),
        ErrorKind::AuthRejected => LiftoffError::AuthRejected("Credentials were rejected".into()),
        _ => LiftoffError::ConnectionUnreachable("no such host".into()),
    }
}

fn api_error(description: &str) -> LiftoffError {
    LiftoffError::PlatformApi {
        status: Some(400),
        code: Some("CF-InMemoryFailure".into()),
        description: description.to_string(),
    }
}

/// Session bound to an [`InMemoryPlatform`]
struct InMemorySession {
    platform: Arc<InMemoryPlatform>,
    settings: ConnectionSettings,
}

impl InMemorySession {
    fn authenticated(&self) -> Result<()> {
        self.platform.check_session(self.settings.credentials.as_ref())?;
        InMemoryPlatform::require_login(self.settings.credentials.as_ref())
    }
}

#[async_trait]
impl PlatformClient for InMemorySession {
    async fn list_service_instances(&self) -> Result<Vec<ServiceInventoryEntry>> {
        self.platform.record(PlatformCall::ListServices);
        self.authenticated()?;
        let mut names: Vec<String> = self.platform.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names.into_iter().map(ServiceInventoryEntry::new).collect())
    }

    async fn create_service_instance(&self, request: &ServiceRequest) -> Result<()> {
        self.platform.record(PlatformCall::CreateService {
            name: request.name.clone(),
            service_type: request.service_type.clone(),
            plan: request.plan.clone(),
        });
        self.authenticated()?;
        if let Some(description) = self.platform.service_failures.get(&request.name) {
            return Err(api_error(description.value()));
        }
        if self.platform.services.contains_key(&request.name) {
            return Err(LiftoffError::PlatformApi {
                status: Some(400),
                code: Some("CF-ServiceInstanceNameTaken".into()),
                description: format!("The service instance name is taken: {}", request.name),
            });
        }
        self.platform
            .services
            .insert(request.name.clone(), request.clone());
        Ok(())
    }

    async fn delete_service_instance(&self, name: &str) -> Result<()> {
        self.platform.record(PlatformCall::DeleteService {
            name: name.to_string(),
        });
        self.authenticated()?;
        if let Some(description) = self.platform.service_failures.get(name) {
            return Err(api_error(description.value()));
        }
        self.platform
            .services
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| LiftoffError::PlatformApi {
                status: Some(404),
                code: Some("CF-ServiceInstanceNotFound".into()),
                description: format!("The service instance could not be found: {}", name),
            })
    }

    async fn push_manifest(&self, manifest: &ResolvedManifest) -> Result<()> {
        self.platform.record(PlatformCall::Push {
            app: manifest.name.clone(),
        });
        self.authenticated()?;

        let delay = self.platform.push_delays.get(&manifest.name).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(description) = self.platform.push_failures.get(&manifest.name) {
            return Err(api_error(description.value()));
        }

        self.platform
            .pushed
            .insert(manifest.name.clone(), manifest.clone());
        self.platform.assign_default_route(manifest);
        Ok(())
    }

    async fn list_routes(&self) -> Result<Vec<Route>> {
        self.platform.record(PlatformCall::ListRoutes);
        self.authenticated()?;
        if let Some(description) = lock(&self.platform.route_failure).clone() {
            return Err(api_error(&description));
        }
        Ok(lock(&self.platform.routes).clone())
    }

    async fn fetch_recent_logs(&self, app_name: &str) -> Result<Vec<String>> {
        self.platform.record(PlatformCall::FetchLogs {
            app: app_name.to_string(),
        });
        self.authenticated()?;
        if let Some(description) = lock(&self.platform.log_failure).clone() {
            return Err(api_error(&description));
        }
        Ok(self
            .platform
            .logs
            .get(app_name)
            .map(|l| l.clone())
            .unwrap_or_default())
    }

    async fn get_endpoint_info(&self) -> Result<EndpointInfo> {
        self.platform.record(PlatformCall::EndpointInfo);
        self.platform
            .check_session(self.settings.credentials.as_ref())?;
        Ok(EndpointInfo {
            api_version: Some("3.0.0-in-memory".into()),
            description: Some(format!("in-memory platform at {}", self.settings.endpoint)),
            authenticated: self.settings.credentials.is_some(),
        })
    }
}

/// Connector handing out sessions on a shared [`InMemoryPlatform`]
pub struct InMemoryConnector {
    platform: Arc<InMemoryPlatform>,
    last_settings: Mutex<Option<ConnectionSettings>>,
}

impl InMemoryConnector {
    pub fn new(platform: Arc<InMemoryPlatform>) -> Self {
        Self {
            platform,
            last_settings: Mutex::new(None),
        }
    }

    pub fn last_settings(&self) -> Option<ConnectionSettings> {
        lock(&self.last_settings).clone()
    }
}

impl PlatformConnector for InMemoryConnector {
    fn connect(&self, settings: ConnectionSettings) -> Result<Arc<dyn PlatformClient>> {
        *lock(&self.last_settings) = Some(settings.clone());
        Ok(Arc::new(InMemorySession {
            platform: self.platform.clone(),
            settings,
        }))
    }
}
