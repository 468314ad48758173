//! In-memory store backing tests and embedded sessions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::{AlertStore, ContextDataStore, HistoryReference, HistoryStore};
use crate::errors::ScanError;
use crate::models::alert::Alert;
use crate::models::http::HttpMessage;

/// One store implementing every persistence contract.
///
/// Each map sits behind its own mutex, so alert mutations are serialized
/// per store (a superset of the per-id requirement).
#[derive(Debug, Default)]
pub struct MemoryStore {
    alerts: Mutex<BTreeMap<i64, Alert>>,
    next_alert_id: AtomicI64,
    history: Mutex<BTreeMap<i64, HttpMessage>>,
    next_history_id: AtomicI64,
    context_data: Mutex<HashMap<(i64, u32), Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_alert_id: AtomicI64::new(1),
            next_history_id: AtomicI64::new(1),
            ..Self::default()
        }
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<i64, ScanError> {
        let id = self.next_alert_id.fetch_add(1, Ordering::SeqCst);
        let mut stored = alert.clone();
        stored.id = id;
        self.alerts
            .lock()
            .expect("alert store lock poisoned")
            .insert(id, stored);
        Ok(id)
    }

    async fn read_alert(&self, id: i64) -> Result<Option<Alert>, ScanError> {
        Ok(self
            .alerts
            .lock()
            .expect("alert store lock poisoned")
            .get(&id)
            .cloned())
    }

    async fn update_alert(&self, alert: &Alert) -> Result<(), ScanError> {
        let mut alerts = self.alerts.lock().expect("alert store lock poisoned");
        if !alerts.contains_key(&alert.id) {
            return Err(ScanError::NotFound(format!("alert {}", alert.id)));
        }
        alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn all_alerts(&self) -> Result<Vec<Alert>, ScanError> {
        Ok(self
            .alerts
            .lock()
            .expect("alert store lock poisoned")
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn record(&self, message: &HttpMessage) -> Result<i64, ScanError> {
        let id = self.next_history_id.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .expect("history store lock poisoned")
            .insert(id, message.clone());
        Ok(id)
    }

    async fn read(&self, history_id: i64) -> Result<Option<HistoryReference>, ScanError> {
        Ok(self
            .history
            .lock()
            .expect("history store lock poisoned")
            .get(&history_id)
            .map(|message| HistoryReference {
                id: history_id,
                message: message.clone(),
            }))
    }
}

#[async_trait]
impl ContextDataStore for MemoryStore {
    async fn read_strings(
        &self,
        context_id: i64,
        record_type: u32,
    ) -> Result<Vec<String>, ScanError> {
        Ok(self
            .context_data
            .lock()
            .expect("context data lock poisoned")
            .get(&(context_id, record_type))
            .cloned()
            .unwrap_or_default())
    }

    async fn write_strings(
        &self,
        context_id: i64,
        record_type: u32,
        values: &[String],
    ) -> Result<(), ScanError> {
        self.context_data
            .lock()
            .expect("context data lock poisoned")
            .insert((context_id, record_type), values.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::http::HttpRequest;

    fn alert() -> Alert {
        Alert::builder(10097)
            .name("Hash Disclosure")
            .uri("https://example.com/")
            .build()
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let first = store.insert_alert(&alert()).await.unwrap();
        let second = store.insert_alert(&alert()).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let read = store.read_alert(first).await.unwrap().unwrap();
        assert_eq!(read.id, first);
    }

    #[tokio::test]
    async fn update_unknown_alert_is_not_found() {
        let store = MemoryStore::new();
        let mut missing = alert();
        missing.id = 42;
        let result = store.update_alert(&missing).await;
        assert!(matches!(result, Err(ScanError::NotFound(_))));
    }

    #[tokio::test]
    async fn history_round_trip() {
        let store = MemoryStore::new();
        let message = HttpMessage::new(HttpRequest::new("GET", "https://example.com/a"));
        let id = store.record(&message).await.unwrap();
        let reference = store.read(id).await.unwrap().unwrap();
        assert_eq!(reference.message.request.uri, "https://example.com/a");
        assert!(store.read(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn context_data_preserves_order() {
        let store = MemoryStore::new();
        let values = vec!["b".to_string(), "a".to_string()];
        store.write_strings(1, 500, &values).await.unwrap();
        assert_eq!(store.read_strings(1, 500).await.unwrap(), values);
        assert!(store.read_strings(2, 500).await.unwrap().is_empty());
    }
}
