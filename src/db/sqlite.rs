//! SQLite-backed session store.
//!
//! The pool is capped at a single connection: SQLite serializes writers
//! anyway, and one connection guarantees record mutations are applied in
//! submission order, satisfying the per-alert-id serialization contract.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use async_trait::async_trait;

use crate::db::{AlertStore, ContextDataStore, HistoryReference, HistoryStore};
use crate::errors::ScanError;
use crate::models::alert::{Alert, Confidence, Risk};
use crate::models::http::HttpMessage;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        plugin_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        risk INTEGER NOT NULL,
        confidence INTEGER NOT NULL,
        description TEXT NOT NULL,
        uri TEXT NOT NULL,
        param TEXT NOT NULL,
        attack TEXT NOT NULL,
        evidence TEXT NOT NULL,
        other_info TEXT NOT NULL,
        solution TEXT NOT NULL,
        refs TEXT NOT NULL,
        cwe_id INTEGER NOT NULL,
        wasc_id INTEGER NOT NULL,
        tags TEXT NOT NULL,
        history_id INTEGER,
        context_id INTEGER,
        raised_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS context_data (
        context_id INTEGER NOT NULL,
        record_type INTEGER NOT NULL,
        seq INTEGER NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (context_id, record_type, seq)
    )",
];

/// SQLite store implementing every persistence contract.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, ScanError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

fn row_to_alert(row: &SqliteRow) -> Result<Alert, ScanError> {
    let risk_code: i64 = row.try_get("risk")?;
    let confidence_code: i64 = row.try_get("confidence")?;
    let tags_json: String = row.try_get("tags")?;

    Ok(Alert {
        id: row.try_get("id")?,
        plugin_id: row.try_get::<i64, _>("plugin_id")? as i32,
        name: row.try_get("name")?,
        risk: Risk::from_code(risk_code as i32)
            .ok_or_else(|| ScanError::Decode(format!("risk code {risk_code}")))?,
        confidence: Confidence::from_code(confidence_code as i32)
            .ok_or_else(|| ScanError::Decode(format!("confidence code {confidence_code}")))?,
        description: row.try_get("description")?,
        uri: row.try_get("uri")?,
        param: row.try_get("param")?,
        attack: row.try_get("attack")?,
        evidence: row.try_get("evidence")?,
        other_info: row.try_get("other_info")?,
        solution: row.try_get("solution")?,
        reference: row.try_get("refs")?,
        cwe_id: row.try_get::<i64, _>("cwe_id")? as u32,
        wasc_id: row.try_get::<i64, _>("wasc_id")? as u32,
        tags: serde_json::from_str(&tags_json)
            .map_err(|e| ScanError::Decode(format!("alert tags: {e}")))?,
        history_id: row.try_get("history_id")?,
        context_id: row.try_get("context_id")?,
        raised_at: row.try_get::<DateTime<Utc>, _>("raised_at")?,
    })
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<i64, ScanError> {
        let tags = serde_json::to_string(&alert.tags)
            .map_err(|e| ScanError::Internal(format!("alert tags: {e}")))?;
        let result = sqlx::query(
            "INSERT INTO alerts (
                plugin_id, name, risk, confidence, description, uri, param,
                attack, evidence, other_info, solution, refs, cwe_id, wasc_id,
                tags, history_id, context_id, raised_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        )
        .bind(alert.plugin_id as i64)
        .bind(&alert.name)
        .bind(alert.risk.code() as i64)
        .bind(alert.confidence.code() as i64)
        .bind(&alert.description)
        .bind(&alert.uri)
        .bind(&alert.param)
        .bind(&alert.attack)
        .bind(&alert.evidence)
        .bind(&alert.other_info)
        .bind(&alert.solution)
        .bind(&alert.reference)
        .bind(alert.cwe_id as i64)
        .bind(alert.wasc_id as i64)
        .bind(tags)
        .bind(alert.history_id)
        .bind(alert.context_id)
        .bind(alert.raised_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn read_alert(&self, id: i64) -> Result<Option<Alert>, ScanError> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_alert).transpose()
    }

    async fn update_alert(&self, alert: &Alert) -> Result<(), ScanError> {
        let tags = serde_json::to_string(&alert.tags)
            .map_err(|e| ScanError::Internal(format!("alert tags: {e}")))?;
        let result = sqlx::query(
            "UPDATE alerts SET
                plugin_id = ?1, name = ?2, risk = ?3, confidence = ?4,
                description = ?5, uri = ?6, param = ?7, attack = ?8,
                evidence = ?9, other_info = ?10, solution = ?11, refs = ?12,
                cwe_id = ?13, wasc_id = ?14, tags = ?15, history_id = ?16,
                context_id = ?17, raised_at = ?18
            WHERE id = ?19",
        )
        .bind(alert.plugin_id as i64)
        .bind(&alert.name)
        .bind(alert.risk.code() as i64)
        .bind(alert.confidence.code() as i64)
        .bind(&alert.description)
        .bind(&alert.uri)
        .bind(&alert.param)
        .bind(&alert.attack)
        .bind(&alert.evidence)
        .bind(&alert.other_info)
        .bind(&alert.solution)
        .bind(&alert.reference)
        .bind(alert.cwe_id as i64)
        .bind(alert.wasc_id as i64)
        .bind(tags)
        .bind(alert.history_id)
        .bind(alert.context_id)
        .bind(alert.raised_at)
        .bind(alert.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ScanError::NotFound(format!("alert {}", alert.id)));
        }
        Ok(())
    }

    async fn all_alerts(&self) -> Result<Vec<Alert>, ScanError> {
        let rows = sqlx::query("SELECT * FROM alerts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_alert).collect()
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn record(&self, message: &HttpMessage) -> Result<i64, ScanError> {
        let encoded = serde_json::to_string(message)
            .map_err(|e| ScanError::Internal(format!("history message: {e}")))?;
        let result = sqlx::query("INSERT INTO history (message) VALUES (?1)")
            .bind(encoded)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn read(&self, history_id: i64) -> Result<Option<HistoryReference>, ScanError> {
        let row = sqlx::query("SELECT message FROM history WHERE id = ?1")
            .bind(history_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let encoded: String = row.try_get("message")?;
        let message = serde_json::from_str(&encoded)
            .map_err(|e| ScanError::Decode(format!("history message: {e}")))?;
        Ok(Some(HistoryReference {
            id: history_id,
            message,
        }))
    }
}

#[async_trait]
impl ContextDataStore for SqliteStore {
    async fn read_strings(
        &self,
        context_id: i64,
        record_type: u32,
    ) -> Result<Vec<String>, ScanError> {
        let rows = sqlx::query(
            "SELECT value FROM context_data
             WHERE context_id = ?1 AND record_type = ?2 ORDER BY seq",
        )
        .bind(context_id)
        .bind(record_type as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("value").map_err(ScanError::from))
            .collect()
    }

    async fn write_strings(
        &self,
        context_id: i64,
        record_type: u32,
        values: &[String],
    ) -> Result<(), ScanError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM context_data WHERE context_id = ?1 AND record_type = ?2")
            .bind(context_id)
            .bind(record_type as i64)
            .execute(&mut *tx)
            .await?;
        for (seq, value) in values.iter().enumerate() {
            sqlx::query(
                "INSERT INTO context_data (context_id, record_type, seq, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(context_id)
            .bind(record_type as i64)
            .bind(seq as i64)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::http::HttpRequest;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn alert() -> Alert {
        Alert::builder(10058)
            .name("GET for POST")
            .risk(Risk::Info)
            .confidence(Confidence::High)
            .uri("https://example.com/form")
            .evidence("HTTP/1.1 200 OK")
            .cwe_id(16)
            .wasc_id(20)
            .tag("OWASP_2021_A04", "")
            .build()
    }

    #[tokio::test]
    async fn alert_insert_read_round_trip() {
        let store = store().await;
        let id = store.insert_alert(&alert()).await.unwrap();
        let read = store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(read.id, id);
        assert_eq!(read.plugin_id, 10058);
        assert_eq!(read.risk, Risk::Info);
        assert_eq!(read.confidence, Confidence::High);
        assert!(read.tags.contains_key("OWASP_2021_A04"));
    }

    #[tokio::test]
    async fn alert_update_overwrites_record() {
        let store = store().await;
        let id = store.insert_alert(&alert()).await.unwrap();
        let mut stored = store.read_alert(id).await.unwrap().unwrap();
        stored = stored.with_risk_confidence(Risk::Info, Confidence::FalsePositive);
        store.update_alert(&stored).await.unwrap();

        let read = store.read_alert(id).await.unwrap().unwrap();
        assert_eq!(read.confidence, Confidence::FalsePositive);
        assert_eq!(read.risk, Risk::Info);
    }

    #[tokio::test]
    async fn update_unknown_alert_is_not_found() {
        let store = store().await;
        let mut missing = alert();
        missing.id = 99;
        let result = store.update_alert(&missing).await;
        assert!(matches!(result, Err(ScanError::NotFound(_))));
    }

    #[tokio::test]
    async fn history_round_trip() {
        let store = store().await;
        let mut message = HttpMessage::new(HttpRequest::new("POST", "https://example.com/login"));
        message.request.body = "a=1".to_string();
        let id = store.record(&message).await.unwrap();
        let reference = store.read(id).await.unwrap().unwrap();
        assert_eq!(reference.message.request.method, "POST");
        assert!(store.read(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn context_data_write_replaces_list() {
        let store = store().await;
        store
            .write_strings(1, 500, &["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        store
            .write_strings(1, 500, &["only".to_string()])
            .await
            .unwrap();
        assert_eq!(store.read_strings(1, 500).await.unwrap(), vec!["only"]);
    }
}
