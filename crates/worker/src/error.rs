use crate::store::StoreError;

/// Infrastructure failures that abort a whole batch.
///
/// Per-job conditions (ineligible status, unmet dependencies, unknown
/// type) never become an `EngineError`; they are reported as outcomes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A handler's call to an external service failed at the transport
    /// level (connection, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A per-job task panicked or was aborted.
    #[error("Job task failed: {0}")]
    TaskFailed(String),
}
