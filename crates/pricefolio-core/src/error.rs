use thiserror::Error;

/// Error types for invalidation operations.
///
/// Remote-store failures are best-effort: they are produced inside the
/// server-side leg, logged, and never surface to the caller of an
/// orchestrator operation. Client-cache failures indicate a structural
/// defect (a malformed key pattern, a broken backend wiring) and propagate.
#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("client cache invalidation failed for key '{key}': {message}")]
    ClientCache { key: String, message: String },

    #[error("remote purge failed: {0}")]
    RemoteStore(String),

    #[error("remote purge timed out after {timeout_ms}ms")]
    RemoteTimeout { timeout_ms: u64 },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl InvalidationError {
    /// Create a new ClientCache error
    pub fn client_cache(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientCache {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a new RemoteStore error
    pub fn remote_store(message: impl Into<String>) -> Self {
        Self::RemoteStore(message.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Best-effort errors are swallowed by the server-side invalidator and
    /// surface only as diagnostics; everything else propagates.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::RemoteStore(_) | Self::RemoteTimeout { .. })
    }
}

/// Convenience result type for invalidation operations
pub type Result<T> = std::result::Result<T, InvalidationError>;
