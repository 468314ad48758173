//! Persistence contracts and the bundled store implementations.
//!
//! The engine consumes storage through narrow record-level traits; anything
//! that can read and write whole records can back it. Two implementations
//! ship here: an in-memory store for tests and embedded use, and a SQLite
//! store for scan sessions that outlive the process.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::alert::Alert;
use crate::models::http::HttpMessage;

/// Record type key under which encoded alert filters are persisted in
/// per-context data.
pub const RECORD_TYPE_ALERT_FILTER: u32 = 500;

/// Narrow record contract over the alert store.
///
/// Implementations must serialize mutations per alert id: two concurrent
/// overrides of the same id may not interleave field-by-field.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert a new alert and return the assigned id.
    async fn insert_alert(&self, alert: &Alert) -> Result<i64, ScanError>;

    /// Read the full record, `None` when the id is unknown.
    async fn read_alert(&self, id: i64) -> Result<Option<Alert>, ScanError>;

    /// Overwrite the record identified by `alert.id`.
    async fn update_alert(&self, alert: &Alert) -> Result<(), ScanError>;

    /// All alerts currently known, in insertion order.
    async fn all_alerts(&self) -> Result<Vec<Alert>, ScanError>;
}

/// A recorded request/response pair an alert can refer back to.
#[derive(Debug, Clone)]
pub struct HistoryReference {
    pub id: i64,
    pub message: HttpMessage,
}

/// Store of observed messages, looked up by history id.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record a message, returning its history id.
    async fn record(&self, message: &HttpMessage) -> Result<i64, ScanError>;

    /// Read a reference, `None` when the id is unknown.
    async fn read(&self, history_id: i64) -> Result<Option<HistoryReference>, ScanError>;
}

/// Per-context persisted string lists, keyed by a record type integer.
///
/// Alert filters are stored one encoded string per filter under
/// [`RECORD_TYPE_ALERT_FILTER`]; list order is preserved.
#[async_trait]
pub trait ContextDataStore: Send + Sync {
    async fn read_strings(
        &self,
        context_id: i64,
        record_type: u32,
    ) -> Result<Vec<String>, ScanError>;

    async fn write_strings(
        &self,
        context_id: i64,
        record_type: u32,
        values: &[String],
    ) -> Result<(), ScanError>;
}
