//! Connection test
//!
//! Connects and asks the endpoint for its info, nothing else. Credentials are
//! optional so reachability can be checked before any are configured.

use crate::credentials::CredentialStore;
use liftoff_platform::{resolve_target, target_warnings, ConnectionFactory, SpaceTarget};
use liftoff_types::{ErrorKind, LiftoffError, TargetSpec};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

/// Fixed budget for the endpoint info call
const CONNECTION_TEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestRequest {
    pub target: TargetSpec,
    #[serde(default)]
    pub credentials_id: Option<String>,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub space: String,
    #[serde(default)]
    pub self_signed: bool,
}

impl ConnectionTestRequest {
    pub fn new(target: impl Into<TargetSpec>) -> Self {
        Self {
            target: target.into(),
            credentials_id: None,
            organization: String::new(),
            space: String::new(),
            self_signed: false,
        }
    }

    pub fn with_credentials(mut self, id: impl Into<String>) -> Self {
        self.credentials_id = Some(id.into());
        self
    }
}

/// Classified result of a connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionValidation {
    Ok { api_version: Option<String> },
    Warning { messages: Vec<String> },
    Error { kind: ErrorKind, message: String },
}

impl ConnectionValidation {
    fn error(err: &LiftoffError, self_signed: bool) -> Self {
        let mut message = err.to_string();
        if err.kind() == ErrorKind::TlsUntrusted && !self_signed && !message.contains("self-signed") {
            message.push_str(" (enable the self-signed option to accept this certificate)");
        }
        ConnectionValidation::Error {
            kind: err.kind(),
            message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionValidation::Error { .. })
    }
}

#[instrument(skip(factory, store), fields(target = %request.target))]
pub async fn test_connection(
    request: &ConnectionTestRequest,
    factory: &ConnectionFactory,
    store: &dyn CredentialStore,
) -> ConnectionValidation {
    let endpoint = match resolve_target(&request.target) {
        Ok(endpoint) => endpoint,
        Err(e) => return ConnectionValidation::error(&e, request.self_signed),
    };
    let warnings = target_warnings(&endpoint);

    let credentials = match request.credentials_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => match store.lookup(id, &endpoint) {
            Some(credentials) => Some(credentials),
            None => {
                let err = LiftoffError::CredentialsMissing { id: id.to_string() };
                return ConnectionValidation::error(&err, request.self_signed);
            }
        },
        _ => None,
    };

    let connection = match factory.connect(
        endpoint,
        credentials,
        SpaceTarget::new(request.organization.clone(), request.space.clone()),
        request.self_signed,
    ) {
        Ok(connection) => connection,
        Err(e) => return ConnectionValidation::error(&e, request.self_signed),
    };

    let info = match tokio::time::timeout(CONNECTION_TEST_TIMEOUT, connection.client().get_endpoint_info()).await {
        Ok(Ok(info)) => info,
        Ok(Err(e)) => return ConnectionValidation::error(&e, request.self_signed),
        Err(_) => {
            let err = LiftoffError::ConnectionUnreachable(format!(
                "no answer from {} within {}s",
                connection.endpoint(),
                CONNECTION_TEST_TIMEOUT.as_secs()
            ));
            return ConnectionValidation::error(&err, request.self_signed);
        }
    };

    info!(api_version = ?info.api_version, authenticated = info.authenticated, "Connection test passed");
    if warnings.is_empty() {
        ConnectionValidation::Ok {
            api_version: info.api_version,
        }
    } else {
        ConnectionValidation::Warning { messages: warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialStore;
    use liftoff_platform::{Credentials, InMemoryConnector, InMemoryPlatform, ProxyPolicy};
    use std::sync::Arc;

    fn factory(platform: &Arc<InMemoryPlatform>) -> ConnectionFactory {
        ConnectionFactory::new(
            Arc::new(InMemoryConnector::new(platform.clone())),
            ProxyPolicy::none(),
        )
    }

    #[tokio::test]
    async fn test_unauthenticated_reachability() {
        let platform = Arc::new(InMemoryPlatform::new());
        let result = test_connection(
            &ConnectionTestRequest::new("api.example.com"),
            &factory(&platform),
            &StaticCredentialStore::new(),
        )
        .await;
        assert!(matches!(result, ConnectionValidation::Ok { api_version: Some(_) }));
    }

    #[tokio::test]
    async fn test_warns_about_host_and_path() {
        let platform = Arc::new(InMemoryPlatform::new());
        let result = test_connection(
            &ConnectionTestRequest::new("https://cf.example.com/v2"),
            &factory(&platform),
            &StaticCredentialStore::new(),
        )
        .await;
        match result {
            ConnectionValidation::Warning { messages } => assert_eq!(messages.len(), 2),
            other => panic!("expected warnings, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_credentials_is_an_error() {
        let platform = Arc::new(InMemoryPlatform::new());
        let result = test_connection(
            &ConnectionTestRequest::new("api.example.com").with_credentials("nope"),
            &factory(&platform),
            &StaticCredentialStore::new(),
        )
        .await;
        assert!(matches!(
            result,
            ConnectionValidation::Error { kind: ErrorKind::CredentialsMissing, .. }
        ));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tls_failure_advises_self_signed() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_connections(ErrorKind::TlsUntrusted);
        let result = test_connection(
            &ConnectionTestRequest::new("api.example.com"),
            &factory(&platform),
            &StaticCredentialStore::new(),
        )
        .await;
        match result {
            ConnectionValidation::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::TlsUntrusted);
                assert!(message.contains("self-signed"));
            }
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let platform = Arc::new(
            InMemoryPlatform::new().with_credentials(Credentials::new("ops", "right")),
        );
        let store = StaticCredentialStore::new().with("ops", Credentials::new("ops", "wrong"));
        let result = test_connection(
            &ConnectionTestRequest::new("api.example.com").with_credentials("ops"),
            &factory(&platform),
            &store,
        )
        .await;
        assert!(matches!(
            result,
            ConnectionValidation::Error { kind: ErrorKind::AuthRejected, .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_target() {
        let platform = Arc::new(InMemoryPlatform::new());
        let result = test_connection(
            &ConnectionTestRequest::new("api.example.com:notaport"),
            &factory(&platform),
            &StaticCredentialStore::new(),
        )
        .await;
        assert!(result.is_error());
    }
}
