//! Service reconciliation
//!
//! Requested services are compared against a snapshot of the platform's
//! inventory taken once at the start. Each request is then created, accepted
//! as-is, or deleted and recreated, strictly in declaration order. The first
//! failure aborts the run before any artifact is touched.

use crate::cancel::CancelSignal;
use crate::events::RunEvents;
use liftoff_platform::PlatformClient;
use liftoff_types::{
    LiftoffError, Result, RunEvent, ServiceAction, ServiceActionRecord, ServiceInventoryEntry,
    ServiceRequest,
};
use std::collections::HashSet;
use tracing::{info, instrument};

/// A planned action for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStep {
    pub request: ServiceRequest,
    pub action: ServiceAction,
}

pub struct ServiceReconciler<'a> {
    client: &'a dyn PlatformClient,
    cancel: &'a CancelSignal,
    events: &'a RunEvents,
}

impl<'a> ServiceReconciler<'a> {
    pub fn new(client: &'a dyn PlatformClient, cancel: &'a CancelSignal, events: &'a RunEvents) -> Self {
        Self {
            client,
            cancel,
            events,
        }
    }

    /// Decide an action per request against an inventory snapshot.
    ///
    /// Duplicate names within one request list are rejected.
    pub fn plan(
        requests: &[ServiceRequest],
        inventory: &[ServiceInventoryEntry],
    ) -> Result<Vec<ServiceStep>> {
        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert(request.name.as_str()) {
                return Err(LiftoffError::InvalidConfiguration(format!(
                    "service '{}' is requested more than once",
                    request.name
                )));
            }
        }

        let existing: HashSet<&str> = inventory.iter().map(|e| e.name.as_str()).collect();
        Ok(requests
            .iter()
            .map(|request| {
                let action = match (existing.contains(request.name.as_str()), request.reset_if_exists) {
                    (false, _) => ServiceAction::Create,
                    (true, false) => ServiceAction::Skip,
                    (true, true) => ServiceAction::Reset,
                };
                ServiceStep {
                    request: request.clone(),
                    action,
                }
            })
            .collect())
    }

    #[instrument(skip(self, requests), fields(requested = requests.len()))]
    pub async fn reconcile(&self, requests: &[ServiceRequest]) -> Result<Vec<ServiceActionRecord>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let inventory = self
            .cancel
            .guard("service listing", self.client.list_service_instances())
            .await?;
        let steps = Self::plan(requests, &inventory)?;

        let mut records = Vec::with_capacity(steps.len());
        for step in steps {
            self.execute(&step).await?;
            records.push(ServiceActionRecord {
                name: step.request.name.clone(),
                action: step.action,
            });
        }
        Ok(records)
    }

    async fn execute(&self, step: &ServiceStep) -> Result<()> {
        let request = &step.request;
        match step.action {
            ServiceAction::Skip => {
                info!(service = %request.name, "Service already exists");
                self.events.emit(RunEvent::ServiceSkipped {
                    name: request.name.clone(),
                });
                Ok(())
            }
            ServiceAction::Create => self.create(request).await,
            ServiceAction::Reset => {
                self.events.emit(RunEvent::ServiceResetting {
                    name: request.name.clone(),
                });
                self.cancel
                    .guard(
                        "service deletion",
                        self.client.delete_service_instance(&request.name),
                    )
                    .await
                    .map_err(|e| reconcile_error(request, "deleted", e))?;
                info!(service = %request.name, "Service deleted");
                self.events.emit(RunEvent::ServiceDeleted {
                    name: request.name.clone(),
                });
                self.create(request).await
            }
        }
    }

    async fn create(&self, request: &ServiceRequest) -> Result<()> {
        info!(
            service = %request.name,
            service_type = %request.service_type,
            plan = %request.plan,
            "Creating service"
        );
        self.events.emit(RunEvent::ServiceCreating {
            name: request.name.clone(),
            service_type: request.service_type.clone(),
            plan: request.plan.clone(),
        });
        self.cancel
            .guard("service creation", self.client.create_service_instance(request))
            .await
            .map_err(|e| reconcile_error(request, "created", e))
    }
}

fn reconcile_error(request: &ServiceRequest, action: &str, err: LiftoffError) -> LiftoffError {
    match err {
        LiftoffError::Interrupted(_) => err,
        other => LiftoffError::ServiceReconcileFailed {
            service: request.name.clone(),
            action: action.to_string(),
            detail: other.report_line(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftoff_platform::{
        resolve_target, ConnectionSettings, Credentials, InMemoryConnector, InMemoryPlatform,
        PlatformCall, PlatformConnector, SpaceTarget,
    };
    use liftoff_types::{ErrorKind, RunId, TargetSpec};
    use std::sync::Arc;

    fn client(platform: &Arc<InMemoryPlatform>) -> Arc<dyn PlatformClient> {
        InMemoryConnector::new(platform.clone())
            .connect(ConnectionSettings {
                endpoint: resolve_target(&TargetSpec::new("api.local")).unwrap(),
                credentials: Some(Credentials::new("u", "p")),
                target: SpaceTarget::new("org", "dev"),
                self_signed: false,
                proxy: None,
            })
            .unwrap()
    }

    async fn reconcile(
        client: &dyn PlatformClient,
        requests: &[ServiceRequest],
    ) -> Result<Vec<ServiceActionRecord>> {
        let cancel = CancelSignal::never();
        let events = RunEvents::detached(RunId::generate());
        ServiceReconciler::new(client, &cancel, &events)
            .reconcile(requests)
            .await
    }

    fn mutations(platform: &InMemoryPlatform) -> Vec<PlatformCall> {
        platform.calls().into_iter().filter(|c| c.is_mutation()).collect()
    }

    #[test]
    fn test_plan_actions() {
        let requests = vec![
            ServiceRequest::new("fresh", "mysql", "small"),
            ServiceRequest::new("kept", "redis", "tiny"),
            ServiceRequest::new("reset", "rabbit", "std").with_reset(true),
        ];
        let inventory = vec![
            ServiceInventoryEntry::new("kept"),
            ServiceInventoryEntry::new("reset"),
            ServiceInventoryEntry::new("unrelated"),
        ];
        let actions: Vec<_> = ServiceReconciler::plan(&requests, &inventory)
            .unwrap()
            .into_iter()
            .map(|s| s.action)
            .collect();
        assert_eq!(
            actions,
            vec![ServiceAction::Create, ServiceAction::Skip, ServiceAction::Reset]
        );
    }

    #[test]
    fn test_plan_rejects_duplicates() {
        let requests = vec![
            ServiceRequest::new("db", "mysql", "small"),
            ServiceRequest::new("db", "mysql", "large"),
        ];
        let err = ServiceReconciler::plan(&requests, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let platform = Arc::new(InMemoryPlatform::new());
        let client = client(&platform);
        let requests = vec![
            ServiceRequest::new("db", "mysql", "small"),
            ServiceRequest::new("cache", "redis", "tiny"),
        ];

        reconcile(client.as_ref(), &requests).await.unwrap();
        assert_eq!(mutations(&platform).len(), 2);

        platform.clear_calls();
        let records = reconcile(client.as_ref(), &requests).await.unwrap();
        assert!(mutations(&platform).is_empty());
        assert!(records.iter().all(|r| r.action == ServiceAction::Skip));
    }

    #[tokio::test]
    async fn test_reset_deletes_then_creates() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.seed_service("db", "mysql", "small");
        let client = client(&platform);

        let requests = vec![ServiceRequest::new("db", "mysql", "large").with_reset(true)];
        reconcile(client.as_ref(), &requests).await.unwrap();

        assert_eq!(
            mutations(&platform),
            vec![
                PlatformCall::DeleteService { name: "db".into() },
                PlatformCall::CreateService {
                    name: "db".into(),
                    service_type: "mysql".into(),
                    plan: "large".into()
                },
            ]
        );
        assert_eq!(platform.service("db").unwrap().plan, "large");
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_requests() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_service("first", "quota exceeded for organization");
        let client = client(&platform);

        let requests = vec![
            ServiceRequest::new("first", "mysql", "small"),
            ServiceRequest::new("second", "redis", "tiny"),
        ];
        let err = reconcile(client.as_ref(), &requests).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceReconcileFailed);
        assert!(err.to_string().contains("quota exceeded"));
        assert!(err.to_string().contains("CF-InMemoryFailure"));
        assert!(platform.service("second").is_none());
        assert_eq!(mutations(&platform).len(), 1);
    }

    #[tokio::test]
    async fn test_no_requests_makes_no_calls() {
        let platform = Arc::new(InMemoryPlatform::new());
        let client = client(&platform);
        assert!(reconcile(client.as_ref(), &[]).await.unwrap().is_empty());
        assert!(platform.calls().is_empty());
    }
}
