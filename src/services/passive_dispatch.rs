//! Passive scan dispatcher.
//!
//! Observed messages are queued to a bounded worker pool so the proxy I/O
//! path never waits on slow rules. Within one message, rules run in
//! registration order; across messages there is no ordering guarantee.
//!
//! Rules are treated as not thread-safe: each worker keeps its own prototype
//! set and clones a fresh instance per message, unless a rule declares
//! single-threaded access, in which case all workers serialize on the one
//! shared instance.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::alert::Alert;
use crate::models::http::HttpMessage;
use crate::rules::{AlertCollector, AlertThreshold, PassiveRule};
use crate::services::lifecycle::AlertPublisher;

/// One message queued for passive scanning.
#[derive(Debug)]
pub struct PassiveJob {
    pub message: HttpMessage,
    pub history_id: i64,
}

enum RuleSlot {
    /// Prototype owned by the worker, cloned per message.
    PerMessage(Box<dyn PassiveRule>),
    /// Shared single-threaded instance, serialized across all workers.
    Shared(Arc<Mutex<Box<dyn PassiveRule>>>),
}

/// Bounded worker pool feeding every queued message through the rules.
pub struct PassiveDispatcher {
    tx: Option<mpsc::Sender<PassiveJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl PassiveDispatcher {
    /// Start the pool. Rules with threshold `Off` are disabled and dropped
    /// here; the rest keep the threshold they were configured with.
    pub fn spawn(
        rules: Vec<Box<dyn PassiveRule>>,
        worker_count: usize,
        queue_capacity: usize,
        publisher: AlertPublisher,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut shared: Vec<Option<Arc<Mutex<Box<dyn PassiveRule>>>>> = Vec::new();
        let mut prototypes: Vec<Option<Box<dyn PassiveRule>>> = Vec::new();
        for rule in rules {
            if rule.alert_threshold() == AlertThreshold::Off {
                tracing::debug!(rule = %rule.metadata().name, "Rule disabled, not dispatching");
                continue;
            }
            if rule.is_single_threaded() {
                shared.push(Some(Arc::new(Mutex::new(rule))));
                prototypes.push(None);
            } else {
                shared.push(None);
                prototypes.push(Some(rule));
            }
        }

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let slots: Vec<RuleSlot> = shared
                .iter()
                .zip(prototypes.iter())
                .map(|(shared, prototype)| match (shared, prototype) {
                    (Some(instance), _) => RuleSlot::Shared(instance.clone()),
                    (None, Some(prototype)) => RuleSlot::PerMessage(prototype.boxed_clone()),
                    (None, None) => unreachable!("slot has neither shared instance nor prototype"),
                })
                .collect();
            let rx = rx.clone();
            let publisher = publisher.clone();
            workers.push(tokio::spawn(worker_loop(rx, slots, publisher)));
        }

        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Queue a message for scanning, waiting for queue capacity.
    ///
    /// Returns `false` once the dispatcher is shutting down.
    pub async fn enqueue(&self, message: HttpMessage, history_id: i64) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        tx.send(PassiveJob {
            message,
            history_id,
        })
        .await
        .is_ok()
    }

    /// Stop accepting messages and wait for queued work to drain.
    pub async fn shutdown(mut self) {
        self.tx.take();
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Passive worker ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PassiveJob>>>,
    mut slots: Vec<RuleSlot>,
    publisher: AlertPublisher,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            return;
        };
        let alerts = scan_message(&mut slots, &job);
        for alert in alerts {
            if let Err(e) = publisher.raise(alert).await {
                tracing::warn!(uri = %job.message.request.uri, error = %e, "Failed to persist alert");
            }
        }
    }
}

/// Run every rule against one message, isolating per-rule failures.
///
/// Synchronous on purpose: the parsed document is not `Send` and must not
/// live across an await point.
fn scan_message(slots: &mut [RuleSlot], job: &PassiveJob) -> Vec<Alert> {
    let html = job
        .message
        .response
        .as_ref()
        .filter(|response| response.is_text() && response.is_html())
        .map(|response| scraper::Html::parse_document(&response.body));

    let mut sink = AlertCollector::new();
    for slot in slots.iter_mut() {
        match slot {
            RuleSlot::PerMessage(prototype) => {
                let mut rule = prototype.boxed_clone();
                run_rule(rule.as_mut(), job, html.as_ref(), &mut sink);
            }
            RuleSlot::Shared(instance) => {
                let mut rule = instance.lock().expect("shared rule lock poisoned");
                run_rule(rule.as_mut(), job, html.as_ref(), &mut sink);
            }
        }
    }

    let mut alerts = sink.take();
    for alert in &mut alerts {
        if alert.uri.is_empty() {
            alert.uri = job.message.request.uri.clone();
        }
        if alert.history_id.is_none() {
            alert.history_id = Some(job.history_id);
        }
    }
    alerts
}

fn run_rule(
    rule: &mut dyn PassiveRule,
    job: &PassiveJob,
    html: Option<&scraper::Html>,
    sink: &mut AlertCollector,
) {
    let name = rule.metadata().name.clone();
    if let Err(e) = rule.scan_request(&job.message, job.history_id as u64, sink) {
        tracing::warn!(
            rule = %name,
            uri = %job.message.request.uri,
            error = %e,
            "Passive rule failed on request, continuing"
        );
    }
    if job.message.response.is_some() {
        if let Err(e) = rule.scan_response(&job.message, job.history_id as u64, html, sink) {
            tracing::warn!(
                rule = %name,
                uri = %job.message.request.uri,
                error = %e,
                "Passive rule failed on response, continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::db::memory::MemoryStore;
    use crate::db::AlertStore;
    use crate::errors::ScanError;
    use crate::models::alert::{Confidence, Risk};
    use crate::models::http::{HttpRequest, HttpResponse};
    use crate::rules::{RuleCategory, RuleMetadata, RuleStatus};

    fn metadata(id: i32) -> RuleMetadata {
        RuleMetadata {
            id,
            name: format!("rule-{id}"),
            risk: Risk::Low,
            confidence: Confidence::Medium,
            category: RuleCategory::Misc,
            cwe_id: 0,
            wasc_id: 0,
            tags: BTreeMap::new(),
            status: RuleStatus::Release,
        }
    }

    /// Raises one alert per response; counts invocations both globally and
    /// in instance-local state (the latter restarts in every clone).
    struct CountingRule {
        metadata: RuleMetadata,
        threshold: AlertThreshold,
        single_threaded: bool,
        invocations: Arc<AtomicUsize>,
        local_count: usize,
        fail: bool,
    }

    impl CountingRule {
        fn boxed(id: i32, invocations: Arc<AtomicUsize>) -> Box<dyn PassiveRule> {
            Box::new(Self {
                metadata: metadata(id),
                threshold: AlertThreshold::default(),
                single_threaded: false,
                invocations,
                local_count: 0,
                fail: false,
            })
        }
    }

    impl PassiveRule for CountingRule {
        fn metadata(&self) -> &RuleMetadata {
            &self.metadata
        }

        fn alert_threshold(&self) -> AlertThreshold {
            self.threshold
        }

        fn set_alert_threshold(&mut self, threshold: AlertThreshold) {
            self.threshold = threshold;
        }

        fn scan_response(
            &mut self,
            _msg: &HttpMessage,
            _id: u64,
            _html: Option<&scraper::Html>,
            sink: &mut AlertCollector,
        ) -> Result<(), ScanError> {
            if self.fail {
                return Err(ScanError::Internal("rule blew up".to_string()));
            }
            self.invocations.fetch_add(1, Ordering::SeqCst);
            self.local_count += 1;
            sink.raise(
                self.metadata
                    .alert()
                    .evidence(self.local_count.to_string())
                    .build(),
            );
            Ok(())
        }

        fn is_single_threaded(&self) -> bool {
            self.single_threaded
        }

        fn boxed_clone(&self) -> Box<dyn PassiveRule> {
            Box::new(Self {
                metadata: self.metadata.clone(),
                threshold: self.threshold,
                single_threaded: self.single_threaded,
                invocations: self.invocations.clone(),
                local_count: 0,
                fail: self.fail,
            })
        }
    }

    fn message(uri: &str) -> HttpMessage {
        let mut msg = HttpMessage::new(HttpRequest::new("GET", uri));
        let mut response = HttpResponse::new(200, "<html><body>ok</body></html>");
        response
            .headers
            .push(("Content-Type".to_string(), "text/html".to_string()));
        msg.response = Some(response);
        msg
    }

    fn publisher() -> (AlertPublisher, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (tx, mut rx) = mpsc::channel(64);
        // Drain events; these tests assert on the store directly.
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        (AlertPublisher::new(store.clone(), tx), store)
    }

    #[tokio::test]
    async fn messages_scanned_and_alerts_stamped() {
        let (publisher, store) = publisher();
        let invocations = Arc::new(AtomicUsize::new(0));
        let dispatcher = PassiveDispatcher::spawn(
            vec![CountingRule::boxed(10001, invocations.clone())],
            2,
            16,
            publisher,
        );

        assert!(dispatcher.enqueue(message("https://example.com/a"), 1).await);
        assert!(dispatcher.enqueue(message("https://example.com/b"), 2).await);
        dispatcher.shutdown().await;

        let alerts = store.all_alerts().await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        for alert in &alerts {
            assert!(!alert.uri.is_empty());
            assert!(alert.history_id.is_some());
        }
    }

    #[tokio::test]
    async fn failing_rule_does_not_stop_others() {
        let (publisher, store) = publisher();
        let invocations = Arc::new(AtomicUsize::new(0));
        let failing = Box::new(CountingRule {
            metadata: metadata(10002),
            threshold: AlertThreshold::default(),
            single_threaded: false,
            invocations: Arc::new(AtomicUsize::new(0)),
            local_count: 0,
            fail: true,
        });
        let dispatcher = PassiveDispatcher::spawn(
            vec![failing, CountingRule::boxed(10003, invocations.clone())],
            1,
            16,
            publisher,
        );

        assert!(dispatcher.enqueue(message("https://example.com/a"), 1).await);
        dispatcher.shutdown().await;

        let alerts = store.all_alerts().await.unwrap();
        assert_eq!(alerts.len(), 1, "second rule still raised its alert");
        assert_eq!(alerts[0].plugin_id, 10003);
    }

    #[tokio::test]
    async fn off_threshold_rule_is_disabled() {
        let (publisher, store) = publisher();
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut rule = CountingRule {
            metadata: metadata(10004),
            threshold: AlertThreshold::default(),
            single_threaded: false,
            invocations: invocations.clone(),
            local_count: 0,
            fail: false,
        };
        rule.set_alert_threshold(AlertThreshold::Off);
        let dispatcher = PassiveDispatcher::spawn(vec![Box::new(rule)], 1, 16, publisher);

        assert!(dispatcher.enqueue(message("https://example.com/a"), 1).await);
        dispatcher.shutdown().await;

        assert!(store.all_alerts().await.unwrap().is_empty());
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_threaded_rule_shares_one_instance() {
        let (publisher, store) = publisher();
        // The evidence comes from instance-local state: per-message clones
        // would report "1" every time, the shared instance keeps counting.
        let rule = Box::new(CountingRule {
            metadata: metadata(10005),
            threshold: AlertThreshold::default(),
            single_threaded: true,
            invocations: Arc::new(AtomicUsize::new(0)),
            local_count: 0,
            fail: false,
        });
        let dispatcher = PassiveDispatcher::spawn(vec![rule], 4, 16, publisher);

        for i in 0..3 {
            assert!(
                dispatcher
                    .enqueue(message(&format!("https://example.com/{i}")), i + 1)
                    .await
            );
        }
        dispatcher.shutdown().await;

        let mut evidence: Vec<String> = store
            .all_alerts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.evidence.clone())
            .collect();
        evidence.sort();
        assert_eq!(evidence, vec!["1", "2", "3"], "one instance saw every message");
    }

    #[tokio::test]
    async fn enqueue_fails_after_shutdown_begins() {
        let (publisher, _store) = publisher();
        let mut dispatcher =
            PassiveDispatcher::spawn(vec![CountingRule::boxed(10006, Arc::default())], 1, 4, publisher);
        dispatcher.tx.take();
        assert!(!dispatcher.enqueue(message("https://example.com/x"), 1).await);
        dispatcher.shutdown().await;
    }
}
