//! Timed push of one resolved manifest
//!
//! The same budget bounds the push call, the log fetch and the route lookup
//! of a manifest. Only the push decides the verdict; logs and routes are
//! best-effort.

use crate::cancel::CancelSignal;
use crate::events::RunEvents;
use liftoff_platform::PlatformClient;
use liftoff_types::{ErrorKind, LiftoffError, PushOutcome, ResolvedManifest, Result, RunEvent};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct PushExecutor<'a> {
    client: &'a dyn PlatformClient,
    budget: Duration,
    cancel: &'a CancelSignal,
    events: &'a RunEvents,
}

impl<'a> PushExecutor<'a> {
    pub fn new(
        client: &'a dyn PlatformClient,
        budget: Duration,
        cancel: &'a CancelSignal,
        events: &'a RunEvents,
    ) -> Self {
        Self {
            client,
            budget,
            cancel,
            events,
        }
    }

    /// Push `manifest`, then surface its recent logs and routes.
    ///
    /// Never fails: the verdict is carried by the returned outcome.
    #[instrument(skip(self, manifest), fields(app = %manifest.name, budget_secs = self.budget.as_secs()))]
    pub async fn push(&self, manifest: &ResolvedManifest) -> PushOutcome {
        let app = manifest.name.as_str();
        info!("Pushing application");
        self.events.emit(RunEvent::PushStarted {
            app: app.to_string(),
        });

        let pushed = self
            .timed(app, "push", self.client.push_manifest(manifest))
            .await
            .map_err(|e| push_error(app, e));

        let mut outcome = match &pushed {
            Ok(()) => {
                info!("Push succeeded");
                self.events.emit(RunEvent::PushSucceeded {
                    app: app.to_string(),
                });
                PushOutcome::success(app)
            }
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "Push failed");
                self.events.emit(RunEvent::PushFailed {
                    app: app.to_string(),
                    kind: e.kind(),
                    reason: e.to_string(),
                });
                PushOutcome::failure(app, e)
            }
        };

        if outcome.error_kind == Some(ErrorKind::Interrupted) {
            return outcome;
        }

        outcome.log_lines = self.surface_logs(app).await;

        if pushed.is_ok() && !manifest.routes_disabled() {
            match self.discover_routes(app).await {
                Ok(routes) => outcome.discovered_routes = routes,
                Err(e) => {
                    warn!(error = %e, "Route lookup failed");
                    self.events
                        .warn(format!("Could not look up routes for {}: {}", app, e));
                    outcome.route_lookup_error = Some(e.to_string());
                }
            }
        }

        outcome
    }

    async fn surface_logs(&self, app: &str) -> usize {
        match self
            .timed(app, "log fetch", self.client.fetch_recent_logs(app))
            .await
        {
            Ok(lines) => {
                for line in &lines {
                    self.events.emit(RunEvent::AppLog {
                        app: app.to_string(),
                        line: line.clone(),
                    });
                }
                lines.len()
            }
            Err(e) => {
                debug!(error = %e, "Recent logs unavailable");
                self.events
                    .warn(format!("Could not fetch recent logs for {}: {}", app, e));
                0
            }
        }
    }

    async fn discover_routes(&self, app: &str) -> Result<Vec<String>> {
        let routes = self
            .timed(app, "route lookup", self.client.list_routes())
            .await?;
        let urls: Vec<String> = routes
            .iter()
            .filter(|route| route.serves(app))
            .map(|route| route.url())
            .collect();
        for url in &urls {
            self.events.emit(RunEvent::RouteDiscovered {
                app: app.to_string(),
                url: url.clone(),
            });
        }
        Ok(urls)
    }

    async fn timed<T, F>(&self, app: &str, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget = self.budget;
        let step_name = format!("{} of {}", step, app);
        self.cancel
            .guard(&step_name, async {
                match tokio::time::timeout(budget, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(LiftoffError::PushTimeout {
                        app: app.to_string(),
                        seconds: budget.as_secs(),
                    }),
                }
            })
            .await
    }
}

/// Platform rejections of the push become `PushFailed` with the platform
/// detail kept verbatim; other kinds pass through.
fn push_error(app: &str, err: LiftoffError) -> LiftoffError {
    match err {
        LiftoffError::PlatformApi { .. } => LiftoffError::PushFailed {
            app: app.to_string(),
            detail: err.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use liftoff_platform::{
        resolve_target, ConnectionSettings, Credentials, InMemoryConnector, InMemoryPlatform,
        PlatformCall, PlatformConnector, Route, SpaceTarget,
    };
    use liftoff_types::{RunEventEnvelope, RunId, TargetSpec};
    use std::sync::Arc;
    use tokio::sync::broadcast;

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

    fn drain(rx: &mut broadcast::Receiver<RunEventEnvelope>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            events.push(envelope.event);
        }
        events
    }

    fn manifest(name: &str) -> ResolvedManifest {
        let mut manifest = ResolvedManifest::new(name);
        manifest.path = Some("/ws".into());
        manifest
    }

    #[tokio::test]
    async fn test_success_reports_routes_and_logs() {
        let platform = Arc::new(InMemoryPlatform::new().with_default_domain("apps.example.com"));
        platform.add_logs("web", &["STG staging complete", "APP started"]);
        platform.add_route(Route::new("other", "apps.example.com").bound_to("other-app"));
        let client = client(&platform);
        let (tx, mut rx) = broadcast::channel(64);
        let events = RunEvents::new(RunId::generate(), tx);
        let cancel = CancelSignal::never();

        let outcome = PushExecutor::new(client.as_ref(), Duration::from_secs(5), &cancel, &events)
            .push(&manifest("web"))
            .await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.log_lines, 2);
        assert_eq!(
            outcome.discovered_routes,
            vec!["https://web.apps.example.com".to_string()]
        );
        let events = drain(&mut rx);
        assert!(events.contains(&RunEvent::AppLog {
            app: "web".into(),
            line: "APP started".into()
        }));
        assert!(events.contains(&RunEvent::RouteDiscovered {
            app: "web".into(),
            url: "https://web.apps.example.com".into()
        }));
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.delay_push("slow", Duration::from_secs(30));
        let client = client(&platform);
        let events = RunEvents::detached(RunId::generate());
        let cancel = CancelSignal::never();

        let started = std::time::Instant::now();
        let outcome =
            PushExecutor::new(client.as_ref(), Duration::from_millis(50), &cancel, &events)
                .push(&manifest("slow"))
                .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::PushTimeout));
        assert!(platform.pushed("slow").is_none());
    }

    #[tokio::test]
    async fn test_platform_failure_keeps_detail_and_fetches_logs() {
        let platform = Arc::new(InMemoryPlatform::new().with_default_domain("apps.example.com"));
        platform.fail_push("web", "Staging error: no buildpack detected");
        platform.add_logs("web", &["STG None of the buildpacks detected a compatible app"]);
        let client = client(&platform);
        let events = RunEvents::detached(RunId::generate());
        let cancel = CancelSignal::never();

        let outcome = PushExecutor::new(client.as_ref(), Duration::from_secs(5), &cancel, &events)
            .push(&manifest("web"))
            .await;

        assert_eq!(outcome.error_kind, Some(ErrorKind::PushFailed));
        let error = outcome.error.unwrap();
        assert!(error.contains("no buildpack detected"));
        assert!(error.contains("status 400"));
        assert_eq!(outcome.log_lines, 1);
        assert!(!platform.calls().contains(&PlatformCall::ListRoutes));
    }

    #[tokio::test]
    async fn test_route_failure_is_recorded_not_fatal() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_routes("routes endpoint unavailable");
        let client = client(&platform);
        let (tx, mut rx) = broadcast::channel(64);
        let events = RunEvents::new(RunId::generate(), tx);
        let cancel = CancelSignal::never();

        let outcome = PushExecutor::new(client.as_ref(), Duration::from_secs(5), &cancel, &events)
            .push(&manifest("web"))
            .await;

        assert!(outcome.succeeded);
        assert!(outcome
            .route_lookup_error
            .as_deref()
            .unwrap()
            .contains("routes endpoint unavailable"));
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, RunEvent::Warning { message } if message.contains("routes"))));
    }

    #[tokio::test]
    async fn test_no_route_skips_lookup() {
        let platform = Arc::new(InMemoryPlatform::new());
        let client = client(&platform);
        let events = RunEvents::detached(RunId::generate());
        let cancel = CancelSignal::never();

        let mut worker = manifest("worker");
        worker.no_route = Some(true);
        let outcome = PushExecutor::new(client.as_ref(), Duration::from_secs(5), &cancel, &events)
            .push(&worker)
            .await;

        assert!(outcome.succeeded);
        assert!(outcome.discovered_routes.is_empty());
        assert!(!platform.calls().contains(&PlatformCall::ListRoutes));
        assert!(platform.calls().contains(&PlatformCall::FetchLogs {
            app: "worker".into()
        }));
    }

    #[tokio::test]
    async fn test_log_failure_keeps_verdict() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.fail_logs("log cache unavailable");
        let client = client(&platform);
        let events = RunEvents::detached(RunId::generate());
        let cancel = CancelSignal::never();

        let outcome = PushExecutor::new(client.as_ref(), Duration::from_secs(5), &cancel, &events)
            .push(&manifest("web"))
            .await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.log_lines, 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_push() {
        let platform = Arc::new(InMemoryPlatform::new());
        platform.delay_push("web", Duration::from_secs(30));
        let client = client(&platform);
        let events = RunEvents::detached(RunId::generate());
        let handle = CancelHandle::new();
        let cancel = handle.signal();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });
        let outcome = PushExecutor::new(client.as_ref(), Duration::from_secs(60), &cancel, &events)
            .push(&manifest("web"))
            .await;
        canceller.await.unwrap();

        assert_eq!(outcome.error_kind, Some(ErrorKind::Interrupted));
        assert!(!platform
            .calls()
            .contains(&PlatformCall::FetchLogs { app: "web".into() }));
    }
}
