//! Orchestrator - one push run end to end
//!
//! Endpoint, credential, manifest and service errors abort the run. Push
//! errors are per application and the remaining manifests still execute.
//! Nothing already created or pushed is rolled back.

use crate::cancel::CancelSignal;
use crate::credentials::CredentialStore;
use crate::events::RunEvents;
use crate::executor::PushExecutor;
use crate::reconciler::ServiceReconciler;
use crate::staging::{ArtifactStager, ExecutionContext, StagedArtifact};
use liftoff_manifest::ManifestResolver;
use liftoff_platform::{resolve_target, ConnectionFactory, ConnectionHandle, SpaceTarget};
use liftoff_types::{
    ErrorKind, LiftoffError, ManifestSource, Result, RunEvent, RunEventEnvelope, RunFailure,
    RunId, RunReport, ServiceRequest, TargetSpec,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

/// Budget applied when a run configures none
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 120;

/// Everything one run needs, passed explicitly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub target: TargetSpec,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub space: String,
    pub credentials_id: String,
    #[serde(default)]
    pub self_signed: bool,
    /// Seconds; zero selects the default
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub services: Vec<ServiceRequest>,
    pub manifest: ManifestSource,
}

impl PushConfig {
    pub fn new(
        target: impl Into<TargetSpec>,
        credentials_id: impl Into<String>,
        manifest: ManifestSource,
    ) -> Self {
        Self {
            target: target.into(),
            organization: String::new(),
            space: String::new(),
            credentials_id: credentials_id.into(),
            self_signed: false,
            timeout_secs: 0,
            services: Vec::new(),
            manifest,
        }
    }

    /// Budget for each push, log fetch and route lookup
    pub fn push_budget(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }
}

/// Sequences a push run over injected collaborators
pub struct Orchestrator {
    /// Credential lookup by id
    credentials: Arc<dyn CredentialStore>,
    /// Lazy session factory with the proxy policy baked in
    connections: ConnectionFactory,
    /// Manifest resolution with the run's token expander
    manifests: ManifestResolver,
    stager: ArtifactStager,
    /// Event channel
    event_tx: broadcast::Sender<RunEventEnvelope>,
}

impl Orchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        connections: ConnectionFactory,
        manifests: ManifestResolver,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(4096);
        Self {
            credentials,
            connections,
            manifests,
            stager: ArtifactStager::default(),
            event_tx,
        }
    }

    pub fn with_stager(mut self, stager: ArtifactStager) -> Self {
        self.stager = stager;
        self
    }

    /// Subscribe to the log stream of every subsequent run
    pub fn subscribe(&self) -> broadcast::Receiver<RunEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Execute one run. The verdict and every partial result are in the
    /// report; `run` itself does not fail.
    #[instrument(skip(self, config, ctx, cancel), fields(target = %config.target))]
    pub async fn run(
        &self,
        config: &PushConfig,
        ctx: &dyn ExecutionContext,
        cancel: &CancelSignal,
    ) -> RunReport {
        let run_id = RunId::generate();
        let events = RunEvents::new(run_id, self.event_tx.clone());
        let mut report = RunReport::new(run_id);
        info!(run_id = %run_id, "Starting push run");

        if let Err(e) = self.execute(config, ctx, cancel, &events, &mut report).await {
            error!(run_id = %run_id, kind = %e.kind(), error = %e, "Run failed");
            events.emit(RunEvent::RunFailed {
                kind: e.kind(),
                reason: e.to_string(),
            });
            report.failure = Some(RunFailure::from(&e));
        }

        let pushed = report.outcomes.iter().filter(|o| o.succeeded).count();
        let failed = report.outcomes.len() - pushed;
        report.finished_at = Some(chrono::Utc::now());
        events.emit(RunEvent::RunCompleted {
            succeeded: report.succeeded(),
            pushed,
            failed,
        });
        info!(run_id = %run_id, succeeded = report.succeeded(), pushed, failed, "Push run finished");
        report
    }

    async fn execute(
        &self,
        config: &PushConfig,
        ctx: &dyn ExecutionContext,
        cancel: &CancelSignal,
        events: &RunEvents,
        report: &mut RunReport,
    ) -> Result<()> {
        // 1. Resolve the endpoint
        let endpoint = resolve_target(&config.target)?;
        if let Some(path) = &endpoint.discarded_path {
            events.warn(format!("Ignoring path '{}' in target {}", path, config.target));
        }

        // 2. Credentials are required before any connection attempt
        let credentials = self
            .credentials
            .lookup(&config.credentials_id, &endpoint)
            .ok_or_else(|| LiftoffError::CredentialsMissing {
                id: config.credentials_id.clone(),
            })?;

        // 3. Open the lazy session
        let connection = self.connections.connect(
            endpoint,
            Some(credentials),
            SpaceTarget::new(config.organization.clone(), config.space.clone()),
            config.self_signed,
        )?;
        events.emit(RunEvent::Connected {
            endpoint: connection.endpoint().to_string(),
            proxied: connection.proxy().is_some(),
        });

        // 4. Services, fail-fast
        report.services = ServiceReconciler::new(connection.client(), cancel, events)
            .reconcile(&config.services)
            .await?;

        // 5. Stage the application bits
        let sub_path = self.manifests.expanded_app_path(&config.manifest)?;
        let staged = cancel
            .guard("staging", self.stager.stage(ctx, sub_path.as_deref()))
            .await?;
        events.emit(RunEvent::ArtifactStaged {
            path: staged.root().display().to_string(),
            transferred: !staged.is_workspace(),
        });

        // 6. Resolve and push, then always drop the staged copy
        let result = self
            .push_all(config, &connection, &staged, cancel, events, report)
            .await;
        cleanup(staged, events);
        result
    }

    async fn push_all(
        &self,
        config: &PushConfig,
        connection: &ConnectionHandle,
        staged: &StagedArtifact,
        cancel: &CancelSignal,
        events: &RunEvents,
        report: &mut RunReport,
    ) -> Result<()> {
        let manifests = self.manifests.resolve(&config.manifest, &staged.location())?;
        for manifest in &manifests {
            if !manifest.has_bits_location() {
                return Err(LiftoffError::ManifestInvalid(format!(
                    "application '{}' has neither a path nor a docker image",
                    manifest.name
                )));
            }
            events.emit(RunEvent::ManifestResolved {
                app: manifest.name.clone(),
            });
        }

        let executor = PushExecutor::new(connection.client(), config.push_budget(), cancel, events);
        for manifest in &manifests {
            let outcome = executor.push(manifest).await;
            let interrupted = outcome.error_kind == Some(ErrorKind::Interrupted);
            let reason = outcome.error.clone();
            report.outcomes.push(outcome);
            if interrupted {
                let skipped = manifests.len() - report.outcomes.len();
                warn!(skipped, "Run cancelled, skipping remaining pushes");
                return Err(LiftoffError::Interrupted(
                    reason.unwrap_or_else(|| "run cancelled".into()),
                ));
            }
        }
        Ok(())
    }
}

fn cleanup(staged: StagedArtifact, events: &RunEvents) {
    match staged.cleanup() {
        Ok(Some(path)) => events.emit(RunEvent::ArtifactCleaned {
            path: path.display().to_string(),
        }),
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "Could not remove staged copy");
            events.warn(format!("Could not remove staged copy: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::credentials::StaticCredentialStore;
    use crate::staging::{AgentContext, LocalContext, TarGzArchiver};
    use liftoff_manifest::BuildContextExpander;
    use liftoff_platform::{
        Credentials, InMemoryConnector, InMemoryPlatform, PlatformCall, ProxyPolicy,
    };
    use liftoff_types::{InlineManifest, ServiceAction};
    use std::path::Path;
    use tempfile::TempDir;

    struct Harness {
        platform: Arc<InMemoryPlatform>,
        connector: Arc<InMemoryConnector>,
        orchestrator: Orchestrator,
    }

    fn harness() -> Harness {
        let platform = Arc::new(
            InMemoryPlatform::new()
                .with_default_domain("apps.example.com")
                .with_credentials(Credentials::new("deployer", "s3cret")),
        );
        let connector = Arc::new(InMemoryConnector::new(platform.clone()));
        let credentials = StaticCredentialStore::new()
            .with("cf-prod", Credentials::new("deployer", "s3cret"));
        let orchestrator = Orchestrator::new(
            Arc::new(credentials),
            ConnectionFactory::new(connector.clone(), ProxyPolicy::none()),
            ManifestResolver::new(Arc::new(
                BuildContextExpander::new().with_var("BUILD_NUMBER", "42"),
            )),
        );
        Harness {
            platform,
            connector,
            orchestrator,
        }
    }

    fn workspace(manifest: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.yml"), manifest).unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/app.jar"), b"jar").unwrap();
        dir
    }

    fn file_config() -> PushConfig {
        let mut config = PushConfig::new(
            "api.example.com",
            "cf-prod",
            ManifestSource::file("manifest.yml"),
        );
        config.organization = "acme".into();
        config.space = "staging".into();
        config
    }

    const TWO_APPS: &str = "applications:\n- name: api\n- name: worker\n  no-route: true\n";

    #[tokio::test]
    async fn test_multi_app_partial_failure() {
        let h = harness();
        h.platform.fail_push("api", "Insufficient resources");
        let ws = workspace(TWO_APPS);

        let report = h
            .orchestrator
            .run(&file_config(), &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;

        assert!(!report.succeeded());
        assert!(report.failure.is_none());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].error_kind, Some(ErrorKind::PushFailed));
        assert!(report.outcomes[1].succeeded);
        assert_eq!(report.primary_error_kind(), Some(ErrorKind::PushFailed));

        let worker = h.platform.pushed("worker").unwrap();
        assert_eq!(worker.path.as_deref(), Some(ws.path()));
        assert!(ws.path().exists());
    }

    #[tokio::test]
    async fn test_inline_run_reports_routes() {
        let h = harness();
        let ws = workspace("");
        let mut inline = InlineManifest::named("hello-${BUILD_NUMBER}");
        inline.path = "target/app.jar".into();
        let mut config = file_config();
        config.manifest = ManifestSource::Inline(inline);

        let report = h
            .orchestrator
            .run(&config, &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;

        assert!(report.succeeded());
        assert_eq!(
            report.routes().collect::<Vec<_>>(),
            vec!["https://hello-42.apps.example.com"]
        );
        let pushed = h.platform.pushed("hello-42").unwrap();
        assert_eq!(pushed.path.as_deref(), Some(ws.path().join("target/app.jar").as_path()));
        assert_eq!(pushed.no_route, Some(false));
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_connecting() {
        let h = harness();
        let ws = workspace(TWO_APPS);
        let mut config = file_config();
        config.credentials_id = "unknown".into();

        let report = h
            .orchestrator
            .run(&config, &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;

        assert_eq!(report.primary_error_kind(), Some(ErrorKind::CredentialsMissing));
        assert!(h.connector.last_settings().is_none());
        assert!(h.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_target() {
        let h = harness();
        let ws = workspace(TWO_APPS);
        let mut config = file_config();
        config.target = TargetSpec::new("ftp://api.example.com");

        let report = h
            .orchestrator
            .run(&config, &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;
        assert_eq!(report.primary_error_kind(), Some(ErrorKind::MalformedTarget));
    }

    #[tokio::test]
    async fn test_service_failure_aborts_before_push() {
        let h = harness();
        h.platform.fail_service("db", "service broker unavailable");
        let ws = workspace(TWO_APPS);
        let mut config = file_config();
        config.services = vec![
            ServiceRequest::new("db", "mysql", "small"),
            ServiceRequest::new("cache", "redis", "tiny"),
        ];

        let report = h
            .orchestrator
            .run(&config, &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;

        assert_eq!(
            report.primary_error_kind(),
            Some(ErrorKind::ServiceReconcileFailed)
        );
        assert!(report.outcomes.is_empty());
        assert_eq!(h.platform.pushed_count(), 0);
        assert!(h.platform.service("cache").is_none());
    }

    #[tokio::test]
    async fn test_services_are_recorded() {
        let h = harness();
        h.platform.seed_service("db", "mysql", "small");
        let ws = workspace(TWO_APPS);
        let mut config = file_config();
        config.services = vec![
            ServiceRequest::new("db", "mysql", "small"),
            ServiceRequest::new("cache", "redis", "tiny"),
        ];

        let report = h
            .orchestrator
            .run(&config, &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;

        assert!(report.succeeded());
        let actions: Vec<_> = report.services.iter().map(|s| s.action).collect();
        assert_eq!(actions, vec![ServiceAction::Skip, ServiceAction::Create]);
    }

    #[tokio::test]
    async fn test_wrong_password_is_auth_rejected() {
        let platform = Arc::new(
            InMemoryPlatform::new().with_credentials(Credentials::new("deployer", "right")),
        );
        let orchestrator = Orchestrator::new(
            Arc::new(StaticCredentialStore::new().with("cf-prod", Credentials::new("deployer", "wrong"))),
            ConnectionFactory::new(
                Arc::new(InMemoryConnector::new(platform.clone())),
                ProxyPolicy::none(),
            ),
            ManifestResolver::new(Arc::new(BuildContextExpander::new())),
        );
        let ws = workspace(TWO_APPS);

        let report = orchestrator
            .run(&file_config(), &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;
        assert_eq!(report.primary_error_kind(), Some(ErrorKind::AuthRejected));
        assert_eq!(platform.pushed_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_staging_is_cleaned_up() {
        let h = harness();
        let mut events = h.orchestrator.subscribe();
        let ws = workspace(TWO_APPS);
        let ctx = AgentContext::new(ws.path(), Arc::new(TarGzArchiver));

        let report = h
            .orchestrator
            .run(&file_config(), &ctx, &CancelSignal::never())
            .await;
        assert!(report.succeeded());

        let api = h.platform.pushed("api").unwrap();
        let staged_root = api.path.unwrap();
        assert_ne!(staged_root, ws.path());
        assert!(!staged_root.exists());
        assert!(ws.path().join("manifest.yml").exists());

        let mut cleaned = false;
        while let Ok(envelope) = events.try_recv() {
            if let RunEvent::ArtifactCleaned { path } = envelope.event {
                assert!(!Path::new(&path).exists());
                cleaned = true;
            }
        }
        assert!(cleaned);
    }

    #[tokio::test]
    async fn test_cancel_stops_remaining_pushes() {
        let h = harness();
        h.platform.delay_push("api", Duration::from_secs(30));
        let ws = workspace(TWO_APPS);
        let handle = CancelHandle::new();
        let signal = handle.signal();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });
        let report = h
            .orchestrator
            .run(&file_config(), &LocalContext::new(ws.path()), &signal)
            .await;
        canceller.await.unwrap();

        assert_eq!(report.primary_error_kind(), Some(ErrorKind::Interrupted));
        assert_eq!(report.outcomes.len(), 1);
        assert!(!h
            .platform
            .calls()
            .contains(&PlatformCall::Push { app: "worker".into() }));
    }

    /// Agent whose transfer never finishes on its own
    struct StalledAgent {
        root: std::path::PathBuf,
    }

    #[async_trait::async_trait]
    impl ExecutionContext for StalledAgent {
        fn is_local(&self) -> bool {
            false
        }

        fn workspace_root(&self) -> &Path {
            &self.root
        }

        async fn archive(&self, _sub_path: Option<&str>) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_staging_transfer() {
        let h = harness();
        let ws = workspace(TWO_APPS);
        let ctx = StalledAgent {
            root: ws.path().to_path_buf(),
        };
        let handle = CancelHandle::new();
        let signal = handle.signal();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            h.orchestrator.run(&file_config(), &ctx, &signal),
        )
        .await
        .unwrap();
        canceller.await.unwrap();

        assert_eq!(report.primary_error_kind(), Some(ErrorKind::Interrupted));
        assert!(report.outcomes.is_empty());
        assert!(!h
            .platform
            .calls()
            .iter()
            .any(|call| matches!(call, PlatformCall::Push { .. })));
    }

    #[test]
    fn test_default_budget() {
        let mut config = file_config();
        assert_eq!(config.push_budget(), Duration::from_secs(DEFAULT_PUSH_TIMEOUT_SECS));
        config.timeout_secs = 5;
        assert_eq!(config.push_budget(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_emits_completion_event() {
        let h = harness();
        let mut events = h.orchestrator.subscribe();
        let ws = workspace(TWO_APPS);

        let report = h
            .orchestrator
            .run(&file_config(), &LocalContext::new(ws.path()), &CancelSignal::never())
            .await;

        let mut last = None;
        while let Ok(envelope) = events.try_recv() {
            assert_eq!(envelope.run_id, report.run_id);
            last = Some(envelope.event);
        }
        assert_eq!(
            last,
            Some(RunEvent::RunCompleted {
                succeeded: true,
                pushed: 2,
                failed: 0
            })
        );
    }
}
