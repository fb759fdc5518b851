//! Connection factory
//!
//! Binds a resolved endpoint, an optional credential pair, the self-signed
//! toggle and the proxy decision into a [`ConnectionHandle`]. Nothing goes
//! over the wire here: unreachable hosts, TLS rejections and bad credentials
//! surface from the first call made through the handle.

use crate::client::PlatformClient;
use crate::proxy::{ProxyDescriptor, ProxyPolicy};
use liftoff_types::{ResolvedEndpoint, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A password that never shows up in logs
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password),
        }
    }
}

/// Organization and space a session operates in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceTarget {
    pub organization: Option<String>,
    pub space: Option<String>,
}

impl SpaceTarget {
    pub fn new(organization: impl Into<String>, space: impl Into<String>) -> Self {
        Self {
            organization: Some(organization.into()).filter(|s: &String| !s.is_empty()),
            space: Some(space.into()).filter(|s: &String| !s.is_empty()),
        }
    }
}

/// Everything a connector needs to open a session
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: ResolvedEndpoint,
    pub credentials: Option<Credentials>,
    pub target: SpaceTarget,
    pub self_signed: bool,
    pub proxy: Option<ProxyDescriptor>,
}

/// Creates platform clients for a set of connection settings.
///
/// Implementations must not perform network I/O in `connect`.
pub trait PlatformConnector: Send + Sync {
    fn connect(&self, settings: ConnectionSettings) -> Result<Arc<dyn PlatformClient>>;
}

/// Session for one orchestration run, never persisted
pub struct ConnectionHandle {
    settings: ConnectionSettings,
    client: Arc<dyn PlatformClient>,
}

impl ConnectionHandle {
    pub fn endpoint(&self) -> &ResolvedEndpoint {
        &self.settings.endpoint
    }

    pub fn proxy(&self) -> Option<&ProxyDescriptor> {
        self.settings.proxy.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.settings.credentials.is_some()
    }

    pub fn client(&self) -> &dyn PlatformClient {
        self.client.as_ref()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

pub struct ConnectionFactory {
    connector: Arc<dyn PlatformConnector>,
    proxy_policy: ProxyPolicy,
}

impl ConnectionFactory {
    pub fn new(connector: Arc<dyn PlatformConnector>, proxy_policy: ProxyPolicy) -> Self {
        Self {
            connector,
            proxy_policy,
        }
    }

    pub fn connect(
        &self,
        endpoint: ResolvedEndpoint,
        credentials: Option<Credentials>,
        target: SpaceTarget,
        self_signed: bool,
    ) -> Result<ConnectionHandle> {
        let proxy = self.proxy_policy.decide(&endpoint.host);
        match &proxy {
            Some(p) => info!(endpoint = %endpoint, proxy = %p, "Connecting through proxy"),
            None => debug!(endpoint = %endpoint, "Connecting directly"),
        }

        let settings = ConnectionSettings {
            endpoint,
            credentials,
            target,
            self_signed,
            proxy,
        };
        let client = self.connector.connect(settings.clone())?;
        Ok(ConnectionHandle { settings, client })
    }
}
