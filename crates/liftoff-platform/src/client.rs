//! Capability surface consumed by a run

use async_trait::async_trait;
use liftoff_types::{ResolvedManifest, Result, ServiceInventoryEntry, ServiceRequest};
use serde::{Deserialize, Serialize};

/// A route assigned to one or more applications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Empty for domain-only routes
    pub host: String,
    pub domain: String,
    /// Empty or starting with `/`
    pub path: String,
    pub apps: Vec<String>,
}

impl Route {
    pub fn new(host: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            domain: domain.into(),
            path: String::new(),
            apps: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn bound_to(mut self, app: impl Into<String>) -> Self {
        self.apps.push(app.into());
        self
    }

    pub fn serves(&self, app: &str) -> bool {
        self.apps.iter().any(|a| a == app)
    }

    /// Operator-facing URL, always reported as https
    pub fn url(&self) -> String {
        if self.host.is_empty() {
            format!("https://{}{}", self.domain, self.path)
        } else {
            format!("https://{}.{}{}", self.host, self.domain, self.path)
        }
    }
}

/// Connectivity information returned by the control plane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub api_version: Option<String>,
    pub description: Option<String>,
    pub authenticated: bool,
}

/// Operations a run issues against the control plane.
///
/// Implementations own their transport, retries and backoff. Connectivity,
/// TLS and authentication failures surface from whichever call happens to
/// be first, since connecting is lazy.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_service_instances(&self) -> Result<Vec<ServiceInventoryEntry>>;

    async fn create_service_instance(&self, request: &ServiceRequest) -> Result<()>;

    async fn delete_service_instance(&self, name: &str) -> Result<()>;

    async fn push_manifest(&self, manifest: &ResolvedManifest) -> Result<()>;

    async fn list_routes(&self) -> Result<Vec<Route>>;

    async fn fetch_recent_logs(&self, app_name: &str) -> Result<Vec<String>>;

    async fn get_endpoint_info(&self) -> Result<EndpointInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_url_formatting() {
        let route = Route::new("hello", "apps.example.com").with_path("/v1");
        assert_eq!(route.url(), "https://hello.apps.example.com/v1");

        let bare = Route::new("", "example.com");
        assert_eq!(bare.url(), "https://example.com");
    }

    #[test]
    fn test_route_serves() {
        let route = Route::new("hello", "example.com").bound_to("hello").bound_to("hello-blue");
        assert!(route.serves("hello-blue"));
        assert!(!route.serves("hello-green"));
    }
}
