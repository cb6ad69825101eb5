//! Probing orchestration and history persistence

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{MonitorError, Result};
use crate::models::requests::ProbeTarget;
use crate::models::{NamedOutcome, NewService, Outcome, ServiceView, SweepEntry, SweepSummary, TestRecord};
use crate::services::probe::{DEFAULT_PROBE_TIMEOUT, Prober};
use crate::store::{HistoryQuery, ServiceStore};

/// Records shown with each service in a listing
pub const LIST_HISTORY_LIMIT: usize = 50;

/// Threshold given to services registered without one, in milliseconds
pub const DEFAULT_THRESHOLD_MS: u64 = 5_000;

/// Where a test ended up after probing
#[derive(Debug)]
enum Persistence {
    /// No service id or no store
    Skipped,
    /// Record written; `errors` is the new counter value after a failed probe
    Recorded { errors: Option<u64> },
    Failed(MonitorError),
}

/// Aggregation layer over a prober and an optional store
#[derive(Clone)]
pub struct Monitor {
    prober: Arc<dyn Prober>,
    store: Option<Arc<dyn ServiceStore>>,
    default_timeout: Duration,
    default_threshold_ms: u64,
}

impl Monitor {
    pub fn new(prober: Arc<dyn Prober>, store: Option<Arc<dyn ServiceStore>>) -> Self {
        Self {
            prober,
            store,
            default_timeout: DEFAULT_PROBE_TIMEOUT,
            default_threshold_ms: DEFAULT_THRESHOLD_MS,
        }
    }

    pub fn with_defaults(mut self, default_timeout: Duration, default_threshold_ms: u64) -> Self {
        self.default_timeout = default_timeout;
        self.default_threshold_ms = default_threshold_ms;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn store(&self) -> Option<&Arc<dyn ServiceStore>> {
        self.store.as_ref()
    }

    fn require_store(&self) -> Result<&Arc<dyn ServiceStore>> {
        self.store.as_ref().ok_or(MonitorError::StorageUnavailable)
    }

    /// Register a new service with a zero error count
    pub async fn register(&self, name: &str, url: &str, threshold: Option<u64>) -> Result<ServiceView> {
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() || url.is_empty() {
            return Err(MonitorError::Validation(
                "Name and URL are required".to_string(),
            ));
        }

        let store = self.require_store()?;
        let service = store
            .insert_service(NewService {
                name: name.to_string(),
                url: url.to_string(),
                threshold: threshold.unwrap_or(self.default_threshold_ms),
            })
            .await?;

        info!("Registered service {} ({}) -> {}", service.name, service.id, service.url);
        Ok(ServiceView::new(service, Vec::new()))
    }

    /// Every service with its most recent history.
    ///
    /// A service whose history cannot be read is still listed, with an empty
    /// history and the failure in `history_error`.
    pub async fn list(&self) -> Result<Vec<ServiceView>> {
        let store = self.require_store()?;
        let services = store.list_services().await?;
        let query = HistoryQuery::recent(LIST_HISTORY_LIMIT);

        let views = join_all(services.into_iter().map(|service| {
            let query = &query;
            async move {
                match store.list_tests(&service.id, query).await {
                    Ok(history) => ServiceView::new(service, history),
                    Err(e) => {
                        warn!("Failed to load history for service {}: {}", service.id, e);
                        ServiceView::without_history(service, e.to_string())
                    }
                }
            }
        }))
        .await;

        debug!("Listed {} services", views.len());
        Ok(views)
    }

    /// Remove a service; its records go with it
    pub async fn delete(&self, id: &str) -> Result<()> {
        let store = self.require_store()?;
        store.delete_service(id).await?;
        info!("Deleted service {}", id);
        Ok(())
    }

    /// Probe `url` and, when a service id is given, record the outcome against it.
    ///
    /// Persistence is best effort: its failures are logged and never change the
    /// returned outcome.
    #[instrument(skip(self))]
    pub async fn record_test(&self, url: &str, timeout: Duration, service_id: Option<&str>) -> Outcome {
        let outcome = self.prober.probe(url, timeout).await;

        match self.persist(service_id, &outcome).await {
            Persistence::Skipped => {}
            Persistence::Recorded { errors: Some(errors) } => {
                debug!("Recorded failed test, service error count now {}", errors);
            }
            Persistence::Recorded { errors: None } => debug!("Recorded test"),
            Persistence::Failed(e) => warn!("Failed to record test for {}: {}", url, e),
        }

        outcome
    }

    /// One sweep step: like `record_test`, but a failed store write turns the
    /// service's entry into a failure.
    async fn sweep_step(&self, url: &str, timeout: Duration, service_id: &str) -> Outcome {
        let outcome = self.prober.probe(url, timeout).await;

        match self.persist(Some(service_id), &outcome).await {
            Persistence::Failed(e) => {
                warn!("Failed to record sweep result for service {}: {}", service_id, e);
                Outcome::failure(format!("Test failed: {}", e))
            }
            _ => outcome,
        }
    }

    async fn persist(&self, service_id: Option<&str>, outcome: &Outcome) -> Persistence {
        let (Some(service_id), Some(store)) = (service_id, self.store.as_ref()) else {
            return Persistence::Skipped;
        };

        if let Err(e) = store.insert_test(service_id, outcome).await {
            return Persistence::Failed(e);
        }

        if outcome.is_success() {
            return Persistence::Recorded { errors: None };
        }

        match store.increment_errors(service_id).await {
            Ok(errors) => Persistence::Recorded {
                errors: Some(errors),
            },
            Err(e) => Persistence::Failed(e),
        }
    }

    /// Stored outcomes of one service, newest first
    pub async fn history(&self, service_id: &str, query: &HistoryQuery) -> Result<Vec<TestRecord>> {
        let store = self.require_store()?;
        store.list_tests(service_id, query).await
    }

    /// Probe every target concurrently without persisting anything.
    ///
    /// Returns exactly one entry per target, in input order. Targets without a URL
    /// fail with "URL is required" and are never dispatched.
    pub async fn test_multiple(&self, targets: Vec<ProbeTarget>, timeout: Duration) -> Vec<NamedOutcome> {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let prober = Arc::clone(&self.prober);
                let url = target.url.trim().to_string();
                tokio::spawn(async move {
                    if url.is_empty() {
                        return Outcome::failure("URL is required");
                    }
                    prober.probe(&url, timeout).await
                })
            })
            .collect();

        let outcomes = join_all(handles).await;

        targets
            .into_iter()
            .zip(outcomes)
            .map(|(target, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    error!("Probe task for {} failed: {}", target.url, e);
                    Outcome::failure(format!("Probe task failed: {}", e))
                });
                NamedOutcome {
                    name: target.name,
                    url: target.url,
                    outcome,
                }
            })
            .collect()
    }

    /// Probe and record every registered service, one at a time.
    ///
    /// Each step, including its store writes, finishes before the next service is
    /// probed. A step whose probe panics or whose store writes fail is reported as a
    /// failed outcome and the sweep moves on.
    #[instrument(skip(self))]
    pub async fn test_all(&self, timeout: Duration) -> Result<SweepSummary> {
        let store = self.require_store()?;
        let services = store.list_services().await?;

        if services.is_empty() {
            info!("Sweep requested with no registered services");
            return Ok(SweepSummary::from_results(Vec::new()));
        }

        info!("Starting sweep over {} services", services.len());
        let mut results = Vec::with_capacity(services.len());

        for service in services {
            let monitor = self.clone();
            let id = service.id.clone();
            let url = service.url.clone();
            let step = tokio::spawn(async move { monitor.sweep_step(&url, timeout, &id).await });

            let outcome = match step.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Sweep step for service {} failed: {}", service.id, e);
                    Outcome::failure(format!("Test failed: {}", e))
                }
            };

            results.push(SweepEntry {
                service_id: service.id,
                name: service.name,
                url: service.url,
                outcome,
            });
        }

        let summary = SweepSummary::from_results(results);
        info!(
            "Sweep finished: {} tested, {} successful, {} failed",
            summary.tested, summary.successful, summary.failed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Service;
    use crate::store::{InMemoryStore, StoreCounts};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Answers from a fixed table; unknown URLs fail, "panic" URLs panic
    struct ScriptedProber {
        outcomes: HashMap<String, bool>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn new(outcomes: &[(&str, bool)]) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes.iter().map(|(u, ok)| (u.to_string(), *ok)).collect(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, address: &str, _timeout: Duration) -> Outcome {
            self.calls.lock().unwrap().push(address.to_string());
            if address.contains("panic") {
                panic!("probe exploded");
            }
            match self.outcomes.get(address) {
                Some(true) => Outcome::success(Duration::from_millis(15), 200),
                _ => Outcome::failure("connection refused"),
            }
        }
    }

    fn monitor(prober: Arc<dyn Prober>) -> (Monitor, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (Monitor::new(prober, Some(store.clone())), store)
    }

    #[tokio::test]
    async fn test_register_validates_and_requires_store() {
        let prober = ScriptedProber::new(&[]);
        let (monitor, _) = monitor(prober.clone());
        assert!(matches!(
            monitor.register(" ", "https://example.test", None).await,
            Err(MonitorError::Validation(_))
        ));

        let without_store = Monitor::new(prober, None);
        assert!(matches!(
            without_store.register("api", "https://example.test", None).await,
            Err(MonitorError::StorageUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_register_defaults() {
        let (monitor, _) = monitor(ScriptedProber::new(&[]));
        let view = monitor.register("api", "https://example.test", None).await.unwrap();

        assert_eq!(view.service.errors, 0);
        assert_eq!(view.service.threshold, DEFAULT_THRESHOLD_MS);
        assert!(view.history.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_failures_accumulate() {
        let (monitor, store) = monitor(ScriptedProber::new(&[]));
        let view = monitor.register("api", "https://down.test", Some(3000)).await.unwrap();

        for expected in 1..=3 {
            let outcome = monitor
                .record_test("https://down.test", DEFAULT_PROBE_TIMEOUT, Some(&view.service.id))
                .await;
            assert!(!outcome.is_success());

            let services = store.list_services().await.unwrap();
            assert_eq!(services[0].errors, expected);
        }
    }

    #[tokio::test]
    async fn test_success_does_not_increment() {
        let (monitor, store) = monitor(ScriptedProber::new(&[("https://up.test", true)]));
        let view = monitor.register("api", "https://up.test", None).await.unwrap();

        monitor
            .record_test("https://up.test", DEFAULT_PROBE_TIMEOUT, Some(&view.service.id))
            .await;

        assert_eq!(store.list_services().await.unwrap()[0].errors, 0);
        assert_eq!(store.counts().await.unwrap(), StoreCounts { services: 1, tests: 1 });
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_outcome() {
        let (monitor, store) = monitor(ScriptedProber::new(&[("https://up.test", true)]));

        let outcome = monitor
            .record_test("https://up.test", DEFAULT_PROBE_TIMEOUT, Some("no-such-service"))
            .await;

        assert!(outcome.is_success());
        assert_eq!(store.counts().await.unwrap().tests, 0);
    }

    #[tokio::test]
    async fn test_record_without_store_or_id_is_silent() {
        let prober = ScriptedProber::new(&[("https://up.test", true)]);
        let bare = Monitor::new(prober.clone(), None);
        assert!(bare.record_test("https://up.test", DEFAULT_PROBE_TIMEOUT, Some("1")).await.is_success());

        let (monitor, store) = monitor(prober);
        monitor.record_test("https://up.test", DEFAULT_PROBE_TIMEOUT, None).await;
        assert_eq!(store.counts().await.unwrap().tests, 0);
    }

    #[tokio::test]
    async fn test_list_includes_history_and_errors() {
        let (monitor, _) = monitor(ScriptedProber::new(&[]));
        let view = monitor.register("api", "https://down.test", Some(3000)).await.unwrap();
        monitor
            .record_test("https://down.test", DEFAULT_PROBE_TIMEOUT, Some(&view.service.id))
            .await;

        let listed = monitor.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].service.errors, 1);
        assert_eq!(listed[0].history.len(), 1);
        assert!(listed[0].history_error.is_none());
    }

    #[tokio::test]
    async fn test_multiple_targets_are_independent() {
        let prober = ScriptedProber::new(&[("https://a.test", true), ("https://c.test", true)]);
        let (monitor, store) = monitor(prober);
        let targets = ["https://a.test", "https://b.test", "https://c.test", "https://panic.test"]
            .iter()
            .map(|url| ProbeTarget {
                name: Some(url.trim_start_matches("https://").to_string()),
                url: url.to_string(),
            })
            .collect();

        let results = monitor.test_multiple(targets, DEFAULT_PROBE_TIMEOUT).await;

        let flags: Vec<_> = results.iter().map(|r| r.outcome.is_success()).collect();
        assert_eq!(flags, vec![true, false, true, false]);
        assert_eq!(results[1].name.as_deref(), Some("b.test"));
        assert_eq!(store.counts().await.unwrap().tests, 0);
    }

    #[tokio::test]
    async fn test_multiple_target_without_url() {
        let prober = ScriptedProber::new(&[("https://a.test", true)]);
        let (monitor, _) = monitor(prober.clone());
        let targets = vec![
            ProbeTarget { name: Some("blank".to_string()), url: "  ".to_string() },
            ProbeTarget { name: None, url: "https://a.test".to_string() },
        ];

        let results = monitor.test_multiple(targets, DEFAULT_PROBE_TIMEOUT).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome.error(), Some("URL is required"));
        assert!(results[1].outcome.is_success());
        assert_eq!(*prober.calls.lock().unwrap(), vec!["https://a.test"]);
    }

    #[tokio::test]
    async fn test_sweep_with_no_services() {
        let (monitor, _) = monitor(ScriptedProber::new(&[]));
        let summary = monitor.test_all(DEFAULT_PROBE_TIMEOUT).await.unwrap();

        assert_eq!((summary.tested, summary.successful, summary.failed), (0, 0, 0));
        assert!(summary.results.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_survives_a_panicking_probe() {
        let prober = ScriptedProber::new(&[("https://a.test", true), ("https://c.test", true)]);
        let (monitor, store) = monitor(prober.clone());
        for (name, url) in [("a", "https://a.test"), ("boom", "https://panic.test"), ("c", "https://c.test")] {
            monitor.register(name, url, None).await.unwrap();
        }

        let summary = monitor.test_all(DEFAULT_PROBE_TIMEOUT).await.unwrap();

        assert_eq!(summary.tested, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[1].name, "boom");
        assert!(!summary.results[1].outcome.is_success());
        assert_eq!(
            *prober.calls.lock().unwrap(),
            vec!["https://a.test", "https://panic.test", "https://c.test"]
        );
        // The panicking step never reached the store
        assert_eq!(store.counts().await.unwrap().tests, 2);
    }

    #[tokio::test]
    async fn test_sweep_requires_store() {
        let bare = Monitor::new(ScriptedProber::new(&[]), None);
        assert!(matches!(
            bare.test_all(DEFAULT_PROBE_TIMEOUT).await,
            Err(MonitorError::StorageUnavailable)
        ));
    }

    /// In-memory store with switchable write and read failures
    #[derive(Default)]
    struct FaultyStore {
        inner: InMemoryStore,
        broken_history: Mutex<Option<String>>,
        failing_inserts: Mutex<Option<String>>,
        failing_increments: AtomicBool,
    }

    #[async_trait]
    impl ServiceStore for FaultyStore {
        fn name(&self) -> &'static str {
            "faulty"
        }
        async fn insert_service(&self, service: NewService) -> Result<Service> {
            self.inner.insert_service(service).await
        }
        async fn list_services(&self) -> Result<Vec<Service>> {
            self.inner.list_services().await
        }
        async fn delete_service(&self, id: &str) -> Result<()> {
            self.inner.delete_service(id).await
        }
        async fn insert_test(&self, service_id: &str, outcome: &Outcome) -> Result<TestRecord> {
            if self.failing_inserts.lock().unwrap().as_deref() == Some(service_id) {
                return Err(MonitorError::Storage("insert failed".to_string()));
            }
            self.inner.insert_test(service_id, outcome).await
        }
        async fn increment_errors(&self, service_id: &str) -> Result<u64> {
            if self.failing_increments.load(Ordering::SeqCst) {
                return Err(MonitorError::Storage("update failed".to_string()));
            }
            self.inner.increment_errors(service_id).await
        }
        async fn list_tests(&self, service_id: &str, query: &HistoryQuery) -> Result<Vec<TestRecord>> {
            if self.broken_history.lock().unwrap().as_deref() == Some(service_id) {
                return Err(MonitorError::Storage("history unavailable".to_string()));
            }
            self.inner.list_tests(service_id, query).await
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        async fn counts(&self) -> Result<StoreCounts> {
            self.inner.counts().await
        }
    }

    #[tokio::test]
    async fn test_list_isolates_history_failures() {
        let store = Arc::new(FaultyStore::default());
        let monitor = Monitor::new(ScriptedProber::new(&[]), Some(store.clone()));
        let api = monitor.register("api", "https://api.test", None).await.unwrap();
        monitor.register("web", "https://web.test", None).await.unwrap();
        *store.broken_history.lock().unwrap() = Some(api.service.id.clone());

        let listed = monitor.list().await.unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].service.name, "api");
        assert!(listed[0].history_error.as_deref().unwrap().contains("history unavailable"));
        assert!(listed[1].history_error.is_none());
    }

    #[tokio::test]
    async fn test_sweep_reports_failed_record_write() {
        let prober = ScriptedProber::new(&[("https://a.test", true), ("https://b.test", true)]);
        let store = Arc::new(FaultyStore::default());
        let monitor = Monitor::new(prober, Some(store.clone()));
        let a = monitor.register("a", "https://a.test", None).await.unwrap();
        monitor.register("b", "https://b.test", None).await.unwrap();
        *store.failing_inserts.lock().unwrap() = Some(a.service.id.clone());

        let summary = monitor.test_all(DEFAULT_PROBE_TIMEOUT).await.unwrap();

        assert_eq!((summary.tested, summary.successful, summary.failed), (2, 1, 1));
        let entry = &summary.results[0].outcome;
        assert!(!entry.is_success());
        assert!(entry.error().unwrap().contains("insert failed"));
        assert!(summary.results[1].outcome.is_success());
        assert_eq!(store.counts().await.unwrap().tests, 1);
    }

    #[tokio::test]
    async fn test_sweep_reports_failed_counter_update() {
        let store = Arc::new(FaultyStore::default());
        let monitor = Monitor::new(ScriptedProber::new(&[]), Some(store.clone()));
        monitor.register("down", "https://down.test", None).await.unwrap();
        store.failing_increments.store(true, Ordering::SeqCst);

        let summary = monitor.test_all(DEFAULT_PROBE_TIMEOUT).await.unwrap();

        assert_eq!(summary.failed, 1);
        let entry = &summary.results[0].outcome;
        assert!(entry.error().unwrap().contains("update failed"));
        assert_eq!(store.counts().await.unwrap().tests, 1);
        assert_eq!(store.list_services().await.unwrap()[0].errors, 0);
    }

    #[tokio::test]
    async fn test_single_test_keeps_outcome_when_write_fails() {
        let prober = ScriptedProber::new(&[("https://a.test", true)]);
        let store = Arc::new(FaultyStore::default());
        let monitor = Monitor::new(prober, Some(store.clone()));
        let a = monitor.register("a", "https://a.test", None).await.unwrap();
        *store.failing_inserts.lock().unwrap() = Some(a.service.id.clone());

        let outcome = monitor
            .record_test("https://a.test", DEFAULT_PROBE_TIMEOUT, Some(&a.service.id))
            .await;

        assert!(outcome.is_success());
    }
}
