use thiserror::Error;

/// Failures of the persistent session store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session store is unavailable")]
    Unavailable,
    #[error("Store rejected write of '{key}': {reason}")]
    WriteRejected { key: String, reason: String },
    #[error("Store access failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Instrumentation script not found in document (matcher: {0})")]
    ScriptNotFound(String),
    #[error("Invalid exclusion pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Server answered with status {0}")]
    Status(u16),
    #[error("Delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Top-level error returned by the recording core.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Persisted session is corrupt: field '{field}' is missing or unreadable")]
    CorruptSession { field: &'static str },
    #[error("Invalid page url: {0}")]
    InvalidUrl(String),
}

impl RecorderError {
    pub fn corrupt(field: &'static str) -> Self {
        RecorderError::CorruptSession { field }
    }
}
