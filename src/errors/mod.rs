//! Unified error handling for the scan engine.

/// Engine error type covering the failure taxonomy of the scan pipeline.
///
/// Rule execution and transport failures are recovered close to where they
/// occur (the dispatcher and the rules log and continue); this type is what
/// crosses module boundaries when a caller needs to know why an operation
/// could not complete.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed record: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Scan stopped")]
    Stopped,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Check if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error originated in the HTTP transport.
    ///
    /// Transport failures are inconclusive by contract: a probe that cannot
    /// be delivered raises no alert and does not abort the scan.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
