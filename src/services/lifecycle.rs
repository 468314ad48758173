//! Alert lifecycle coordination.
//!
//! Every raised alert travels raise → resolve (site node attached) → filter
//! (global set, then matching contexts, first match wins) → persist. The
//! coordinator is the single consumer of the alert-added channel, so record
//! mutations it performs are naturally serialized per alert id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::{AlertStore, ContextDataStore, HistoryStore, RECORD_TYPE_ALERT_FILTER};
use crate::errors::ScanError;
use crate::models::alert::Alert;
use crate::models::context::{Context, SessionContexts};
use crate::models::site::SiteTree;
use crate::services::alert_filter::{
    apply_override, AlertFilter, ContextFilterManager, GlobalAlertFilters,
};
use crate::services::fingerprint;
use crate::services::metrics::MetricsSink;

/// Event published when a new alert lands in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertEvent {
    pub alert_id: i64,
}

/// Producer half of the pipeline: persists a raised alert and publishes its
/// event to the coordinator.
#[derive(Clone)]
pub struct AlertPublisher {
    store: Arc<dyn AlertStore>,
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertPublisher {
    pub fn new(store: Arc<dyn AlertStore>, tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { store, tx }
    }

    /// Persist the alert and publish its id, returning the assigned id.
    pub async fn raise(&self, alert: Alert) -> Result<i64, ScanError> {
        let id = self.store.insert_alert(&alert).await?;
        if self.tx.send(AlertEvent { alert_id: id }).await.is_err() {
            tracing::warn!(alert_id = id, "Alert channel closed, event dropped");
        }
        Ok(id)
    }
}

/// Observer notified with the before/after pair whenever an override is
/// applied, so tree views can update in place.
pub trait AlertTreeObserver: Send + Sync {
    fn alert_updated(&self, before: &Alert, after: &Alert);
}

/// Owns filter evaluation and all its side effects.
pub struct LifecycleCoordinator {
    store: Arc<dyn AlertStore>,
    history: Arc<dyn HistoryStore>,
    context_data: Arc<dyn ContextDataStore>,
    metrics: Arc<dyn MetricsSink>,
    contexts: SessionContexts,
    global_filters: GlobalAlertFilters,
    /// Context filter managers, lazily rebuilt from persisted context data.
    managers: HashMap<i64, ContextFilterManager>,
    tree: SiteTree,
    observer: Option<Arc<dyn AlertTreeObserver>>,
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn AlertStore>,
        history: Arc<dyn HistoryStore>,
        context_data: Arc<dyn ContextDataStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            history,
            context_data,
            metrics,
            contexts: SessionContexts::new(),
            global_filters: GlobalAlertFilters::new(),
            managers: HashMap::new(),
            tree: SiteTree::new(),
            observer: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn AlertTreeObserver>) {
        self.observer = Some(observer);
    }

    pub fn set_global_filters(&mut self, filters: GlobalAlertFilters) {
        self.global_filters = filters;
    }

    pub fn global_filters_mut(&mut self) -> &mut GlobalAlertFilters {
        &mut self.global_filters
    }

    pub fn add_context(&mut self, context: Context) -> Result<(), ScanError> {
        self.contexts.add(context)
    }

    /// Drop a context and its filter manager immediately.
    pub fn discard_context(&mut self, context_id: i64) {
        self.contexts.remove(context_id);
        self.managers.remove(&context_id);
    }

    /// Clear every per-context manager; they are rebuilt lazily from
    /// persisted context data on next access.
    pub fn session_about_to_change(&mut self) {
        self.managers.clear();
    }

    /// Add a filter to its context's manager and persist the manager's list.
    pub async fn add_context_filter(&mut self, filter: AlertFilter) -> Result<(), ScanError> {
        let Some(context_id) = filter.context_id else {
            return Err(ScanError::Validation(
                "context filter requires a context id".to_string(),
            ));
        };
        self.ensure_manager(context_id).await;
        let manager = self
            .managers
            .get_mut(&context_id)
            .expect("manager just ensured");
        if manager.add(filter) {
            self.persist_context_filters(context_id).await?;
        }
        Ok(())
    }

    /// Consume alert events until the channel closes.
    pub async fn run(mut self, mut rx: mpsc::Receiver<AlertEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Alert channel closed, lifecycle coordinator stopping");
    }

    /// Process one alert-added event.
    pub async fn handle_event(&mut self, event: AlertEvent) {
        let alert = match self.store.read_alert(event.alert_id).await {
            Ok(Some(alert)) => alert,
            Ok(None) => {
                tracing::warn!(alert_id = event.alert_id, "Alert record not found, dropping");
                return;
            }
            Err(e) => {
                tracing::warn!(alert_id = event.alert_id, error = %e, "Alert record unreadable, dropping");
                return;
            }
        };
        self.handle_alert(alert).await;
    }

    async fn handle_alert(&mut self, alert: Alert) {
        tracing::debug!(alert_id = alert.id, uri = %alert.uri, "Processing alert");

        // Resolve the site node before filtering so tree updates and
        // duplicate sync always have a populated node to work with.
        let Some(node_id) = self.resolve_site_node(&alert).await else {
            tracing::warn!(alert_id = alert.id, "No history reference, dropping alert");
            return;
        };
        self.tree.attach_alert(node_id, alert.id);

        // Global filters first; a match here stops all further evaluation.
        let global_match = self
            .global_filters
            .filters()
            .iter()
            .find(|f| f.applies_to_alert(&alert, None))
            .cloned();
        if let Some(filter) = global_match {
            self.apply_and_record(&alert, &filter, Some(node_id)).await;
            return;
        }

        // Then every context whose scope contains the URI, in registration
        // order; inside a context, filters in insertion order.
        let context_ids: Vec<i64> = self
            .contexts
            .for_url(&alert.uri)
            .map(|context| context.id)
            .collect();
        for context_id in context_ids {
            self.ensure_manager(context_id).await;
            let matched = self
                .managers
                .get(&context_id)
                .and_then(|manager| {
                    manager
                        .filters()
                        .iter()
                        .find(|f| f.applies_to_alert(&alert, None))
                        .cloned()
                });
            if let Some(filter) = matched {
                self.apply_and_record(&alert, &filter, Some(node_id)).await;
                return;
            }
        }
    }

    /// Site node for the alert's recorded message, `None` when the alert has
    /// no usable history reference.
    async fn resolve_site_node(&mut self, alert: &Alert) -> Option<u64> {
        let history_id = alert.history_id?;
        let reference = match self.history.read(history_id).await {
            Ok(Some(reference)) => reference,
            Ok(None) => {
                tracing::warn!(alert_id = alert.id, history_id, "History reference missing");
                return None;
            }
            Err(e) => {
                tracing::warn!(alert_id = alert.id, history_id, error = %e, "History unreadable");
                return None;
            }
        };
        let method = &reference.message.request.method;
        let uri = &reference.message.request.uri;
        let key = fingerprint::node_key(method, uri);
        Some(self.tree.add_path(&key, method, &fingerprint::node_path(uri)))
    }

    /// Apply the filter override, persist it, notify the observer, sync
    /// duplicates on the same node, and bump the metrics counter.
    async fn apply_and_record(
        &mut self,
        alert: &Alert,
        filter: &AlertFilter,
        node_id: Option<u64>,
    ) {
        let updated = apply_override(alert, filter.new_risk);
        tracing::debug!(
            alert_id = alert.id,
            plugin_id = alert.plugin_id,
            new_risk = filter.new_risk.code(),
            "Overriding alert"
        );
        if let Err(e) = self.store.update_alert(&updated).await {
            tracing::warn!(alert_id = alert.id, error = %e, "Alert update failed, abandoning");
            return;
        }
        if let Some(observer) = &self.observer {
            observer.alert_updated(alert, &updated);
        }
        if let Some(node_id) = node_id {
            self.sync_node_duplicates(&updated, filter, node_id).await;
        }
        self.metrics.inc_counter(&format!(
            "alert_filter.{}.risk.{}",
            updated.plugin_id,
            filter.new_risk.code()
        ));
    }

    /// Re-apply the override to other occurrences of the same finding on the
    /// same site node, so duplicates never show stale risk.
    async fn sync_node_duplicates(&mut self, updated: &Alert, filter: &AlertFilter, node_id: u64) {
        let duplicate_ids: Vec<i64> = self
            .tree
            .node(node_id)
            .map(|node| {
                node.alert_ids()
                    .iter()
                    .copied()
                    .filter(|id| *id != updated.id)
                    .collect()
            })
            .unwrap_or_default();

        for duplicate_id in duplicate_ids {
            let duplicate = match self.store.read_alert(duplicate_id).await {
                Ok(Some(duplicate)) => duplicate,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(alert_id = duplicate_id, error = %e, "Duplicate unreadable");
                    continue;
                }
            };
            if duplicate.plugin_id != updated.plugin_id || duplicate.name != updated.name {
                continue;
            }
            let synced = apply_override(&duplicate, filter.new_risk);
            if synced == duplicate {
                continue;
            }
            if let Err(e) = self.store.update_alert(&synced).await {
                tracing::warn!(alert_id = duplicate_id, error = %e, "Duplicate sync failed");
                continue;
            }
            if let Some(observer) = &self.observer {
                observer.alert_updated(&duplicate, &synced);
            }
        }
    }

    /// Evaluate a filter against every known alert, returning the match
    /// count and overriding each match unless `test_only`.
    pub async fn apply_filter(
        &mut self,
        filter: &AlertFilter,
        test_only: bool,
    ) -> Result<usize, ScanError> {
        let context = filter
            .context_id
            .and_then(|id| self.contexts.get(id))
            .cloned();
        let mut count = 0;
        let alerts = self.store.all_alerts().await?;
        for alert in alerts {
            if !filter.applies_to_alert(&alert, context.as_ref()) {
                continue;
            }
            count += 1;
            if !test_only {
                self.apply_and_record(&alert, filter, None).await;
            }
        }
        Ok(count)
    }

    async fn ensure_manager(&mut self, context_id: i64) {
        if self.managers.contains_key(&context_id) {
            return;
        }
        let mut manager = ContextFilterManager::new(context_id);
        match self
            .context_data
            .read_strings(context_id, RECORD_TYPE_ALERT_FILTER)
            .await
        {
            Ok(entries) => {
                for entry in entries {
                    if let Some(filter) = AlertFilter::decode_opt(Some(context_id), &entry) {
                        manager.add(filter);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(context_id, error = %e, "Context filters unreadable, starting empty");
            }
        }
        self.managers.insert(context_id, manager);
    }

    async fn persist_context_filters(&self, context_id: i64) -> Result<(), ScanError> {
        let Some(manager) = self.managers.get(&context_id) else {
            return Ok(());
        };
        let encoded: Vec<String> = manager.filters().iter().map(AlertFilter::encode).collect();
        self.context_data
            .write_strings(context_id, RECORD_TYPE_ALERT_FILTER, &encoded)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::db::memory::MemoryStore;
    use crate::models::alert::{Confidence, Risk};
    use crate::models::http::{HttpMessage, HttpRequest};
    use crate::services::alert_filter::NewRisk;
    use crate::services::metrics::InMemoryMetrics;

    struct RecordingObserver {
        updates: Mutex<Vec<(Alert, Alert)>>,
    }

    impl RecordingObserver {
        fn new() -> Self {
            Self {
                updates: Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }
    }

    impl AlertTreeObserver for RecordingObserver {
        fn alert_updated(&self, before: &Alert, after: &Alert) {
            self.updates
                .lock()
                .unwrap()
                .push((before.clone(), after.clone()));
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        metrics: Arc<InMemoryMetrics>,
        observer: Arc<RecordingObserver>,
        coordinator: LifecycleCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(InMemoryMetrics::new());
        let observer = Arc::new(RecordingObserver::new());
        let mut coordinator = LifecycleCoordinator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            metrics.clone(),
        );
        coordinator.set_observer(observer.clone());
        Fixture {
            store,
            metrics,
            observer,
            coordinator,
        }
    }

    async fn raise(
        fixture: &Fixture,
        plugin_id: i32,
        uri: &str,
        risk: Risk,
        confidence: Confidence,
    ) -> i64 {
        let message = HttpMessage::new(HttpRequest::new("GET", uri));
        let history_id = fixture.store.record(&message).await.unwrap();
        let alert = Alert::builder(plugin_id)
            .name(format!("rule-{plugin_id}"))
            .uri(uri)
            .risk(risk)
            .confidence(confidence)
            .history_id(history_id)
            .build();
        fixture.store.insert_alert(&alert).await.unwrap()
    }

    fn admin_context() -> Context {
        Context::new(1, "admin")
            .include(r"https://example\.com/admin/.*")
            .unwrap()
    }

    #[tokio::test]
    async fn global_false_positive_filter_applies() {
        let mut fx = fixture();
        fx.coordinator
            .global_filters_mut()
            .add(AlertFilter::new(None, 10058, NewRisk::FalsePositive));

        let id = raise(
            &fx,
            10058,
            "https://example.com/form",
            Risk::Info,
            Confidence::High,
        )
        .await;
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;

        let alert = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(alert.risk, Risk::Info);
        assert_eq!(alert.confidence, Confidence::FalsePositive);
        assert_eq!(fx.metrics.get("alert_filter.10058.risk.-1"), 1);
        assert_eq!(fx.observer.count(), 1);
    }

    #[tokio::test]
    async fn first_matching_global_filter_wins() {
        let mut fx = fixture();
        // Both filters match; only the first may run.
        fx.coordinator
            .global_filters_mut()
            .add(AlertFilter::new(None, 10097, NewRisk::Risk(Risk::High)));
        fx.coordinator
            .global_filters_mut()
            .add(AlertFilter::new(None, 10097, NewRisk::FalsePositive));

        let id = raise(
            &fx,
            10097,
            "https://example.com/page",
            Risk::Low,
            Confidence::Low,
        )
        .await;
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;

        let alert = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(alert.risk, Risk::High);
        assert_eq!(alert.confidence, Confidence::Low);
        assert_eq!(fx.metrics.get("alert_filter.10097.risk.3"), 1);
        assert_eq!(fx.metrics.get("alert_filter.10097.risk.-1"), 0);
    }

    #[tokio::test]
    async fn global_filter_preempts_context_filter() {
        let mut fx = fixture();
        fx.coordinator.add_context(admin_context()).unwrap();
        fx.coordinator
            .add_context_filter(AlertFilter::new(Some(1), 10058, NewRisk::Risk(Risk::High)))
            .await
            .unwrap();
        fx.coordinator
            .global_filters_mut()
            .add(AlertFilter::new(None, 10058, NewRisk::FalsePositive));

        let id = raise(
            &fx,
            10058,
            "https://example.com/admin/users",
            Risk::Info,
            Confidence::High,
        )
        .await;
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;

        let alert = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(alert.confidence, Confidence::FalsePositive);
        assert_eq!(alert.risk, Risk::Info, "global outcome, not the context one");
    }

    #[tokio::test]
    async fn context_filter_scoped_by_uri() {
        let mut fx = fixture();
        fx.coordinator.add_context(admin_context()).unwrap();
        fx.coordinator
            .add_context_filter(
                AlertFilter::new(Some(1), 10097, NewRisk::Risk(Risk::High))
                    .with_url(r"https://example\.com/admin/.*", true),
            )
            .await
            .unwrap();

        let in_scope = raise(
            &fx,
            10097,
            "https://example.com/admin/users",
            Risk::Low,
            Confidence::Medium,
        )
        .await;
        let out_of_scope = raise(
            &fx,
            10097,
            "https://example.com/public",
            Risk::Low,
            Confidence::Medium,
        )
        .await;
        fx.coordinator
            .handle_event(AlertEvent { alert_id: in_scope })
            .await;
        fx.coordinator
            .handle_event(AlertEvent {
                alert_id: out_of_scope,
            })
            .await;

        let scoped = fx.store.read_alert(in_scope).await.unwrap().unwrap();
        assert_eq!(scoped.risk, Risk::High);
        assert_eq!(scoped.confidence, Confidence::Medium, "confidence unchanged");

        let unscoped = fx.store.read_alert(out_of_scope).await.unwrap().unwrap();
        assert_eq!(unscoped.risk, Risk::Low, "outside the context, untouched");
    }

    #[tokio::test]
    async fn unmatched_alert_left_unmodified() {
        let mut fx = fixture();
        fx.coordinator
            .global_filters_mut()
            .add(AlertFilter::new(None, 20018, NewRisk::FalsePositive));

        let id = raise(
            &fx,
            10058,
            "https://example.com/form",
            Risk::Info,
            Confidence::High,
        )
        .await;
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;

        let alert = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(alert.confidence, Confidence::High);
        assert_eq!(fx.observer.count(), 0);
    }

    #[tokio::test]
    async fn missing_record_is_dropped() {
        let mut fx = fixture();
        // Must not panic or error; the gap is logged and skipped.
        fx.coordinator
            .handle_event(AlertEvent { alert_id: 999 })
            .await;
        assert_eq!(fx.observer.count(), 0);
    }

    #[tokio::test]
    async fn alert_without_history_is_dropped() {
        let mut fx = fixture();
        fx.coordinator
            .global_filters_mut()
            .add(AlertFilter::new(None, 10058, NewRisk::FalsePositive));

        let alert = Alert::builder(10058)
            .uri("https://example.com/form")
            .confidence(Confidence::High)
            .build();
        let id = fx.store.insert_alert(&alert).await.unwrap();
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;

        let stored = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(stored.confidence, Confidence::High, "no node, no filtering");
    }

    #[tokio::test]
    async fn duplicates_on_same_node_are_synchronized() {
        let mut fx = fixture();
        // Matches only alerts with param "q", so the first occurrence can
        // only be updated through node-duplicate sync.
        fx.coordinator.global_filters_mut().add(
            AlertFilter::new(None, 10097, NewRisk::FalsePositive).with_parameter("q", false),
        );

        // Same resource (query dropped from the node key), two occurrences
        // of the same finding.
        let first = raise(
            &fx,
            10097,
            "https://example.com/page?v=1",
            Risk::Low,
            Confidence::Low,
        )
        .await;
        let message =
            HttpMessage::new(HttpRequest::new("GET", "https://example.com/page?v=2"));
        let history_id = fx.store.record(&message).await.unwrap();
        let second = fx
            .store
            .insert_alert(
                &Alert::builder(10097)
                    .name("rule-10097")
                    .uri("https://example.com/page?v=2")
                    .param("q")
                    .risk(Risk::Low)
                    .confidence(Confidence::Low)
                    .history_id(history_id)
                    .build(),
            )
            .await
            .unwrap();

        fx.coordinator
            .handle_event(AlertEvent { alert_id: first })
            .await;
        let untouched = fx.store.read_alert(first).await.unwrap().unwrap();
        assert_eq!(untouched.confidence, Confidence::Low, "no param, no direct match");

        fx.coordinator
            .handle_event(AlertEvent { alert_id: second })
            .await;
        let first_alert = fx.store.read_alert(first).await.unwrap().unwrap();
        let second_alert = fx.store.read_alert(second).await.unwrap().unwrap();
        assert_eq!(second_alert.confidence, Confidence::FalsePositive);
        assert_eq!(
            first_alert.confidence,
            Confidence::FalsePositive,
            "sibling on the node synchronized"
        );
    }

    #[tokio::test]
    async fn apply_filter_counts_without_mutation_in_test_mode() {
        let mut fx = fixture();
        let a = raise(
            &fx,
            10058,
            "https://example.com/a",
            Risk::Info,
            Confidence::High,
        )
        .await;
        raise(
            &fx,
            10097,
            "https://example.com/b",
            Risk::Low,
            Confidence::Low,
        )
        .await;

        let filter = AlertFilter::new(None, 10058, NewRisk::FalsePositive);
        let count = fx.coordinator.apply_filter(&filter, true).await.unwrap();
        assert_eq!(count, 1);
        let alert = fx.store.read_alert(a).await.unwrap().unwrap();
        assert_eq!(alert.confidence, Confidence::High, "test only");

        let count = fx.coordinator.apply_filter(&filter, false).await.unwrap();
        assert_eq!(count, 1);
        let alert = fx.store.read_alert(a).await.unwrap().unwrap();
        assert_eq!(alert.confidence, Confidence::FalsePositive);
    }

    #[tokio::test]
    async fn managers_rebuilt_from_persisted_data_after_session_change() {
        let mut fx = fixture();
        fx.coordinator.add_context(admin_context()).unwrap();
        fx.coordinator
            .add_context_filter(AlertFilter::new(Some(1), 10058, NewRisk::FalsePositive))
            .await
            .unwrap();

        fx.coordinator.session_about_to_change();
        assert!(fx.coordinator.managers.is_empty());

        // The persisted copy drives filtering after the clear.
        let id = raise(
            &fx,
            10058,
            "https://example.com/admin/users",
            Risk::Info,
            Confidence::High,
        )
        .await;
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;
        let alert = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(alert.confidence, Confidence::FalsePositive);
    }

    #[tokio::test]
    async fn malformed_persisted_filter_skipped_on_load() {
        let fx = fixture();
        let good = AlertFilter::new(Some(1), 10058, NewRisk::FalsePositive).encode();
        fx.store
            .write_strings(
                1,
                RECORD_TYPE_ALERT_FILTER,
                &["garbage".to_string(), good],
            )
            .await
            .unwrap();

        let mut coordinator = fx.coordinator;
        coordinator.ensure_manager(1).await;
        assert_eq!(coordinator.managers[&1].filters().len(), 1);
        assert_eq!(coordinator.managers[&1].filters()[0].rule_id, 10058);
    }

    #[tokio::test]
    async fn discard_context_drops_manager() {
        let mut fx = fixture();
        fx.coordinator.add_context(admin_context()).unwrap();
        fx.coordinator
            .add_context_filter(AlertFilter::new(Some(1), 10058, NewRisk::FalsePositive))
            .await
            .unwrap();

        fx.coordinator.discard_context(1);
        assert!(fx.coordinator.managers.is_empty());

        let id = raise(
            &fx,
            10058,
            "https://example.com/admin/users",
            Risk::Info,
            Confidence::High,
        )
        .await;
        fx.coordinator.handle_event(AlertEvent { alert_id: id }).await;
        let alert = fx.store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(alert.confidence, Confidence::High, "context gone, no filtering");
    }

    #[tokio::test]
    async fn publisher_raises_through_channel() {
        let fx = fixture();
        let (tx, mut rx) = mpsc::channel(8);
        let publisher = AlertPublisher::new(fx.store.clone(), tx);

        let alert = Alert::builder(10058).uri("https://example.com/").build();
        let id = publisher.raise(alert).await.unwrap();
        assert_eq!(rx.recv().await, Some(AlertEvent { alert_id: id }));
        assert!(fx.store.read_alert(id).await.unwrap().is_some());
    }
}
