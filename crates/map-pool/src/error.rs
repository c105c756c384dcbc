//! Pool error types.

use thiserror::Error;

/// Errors surfaced by [`KeyedPool`](crate::KeyedPool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Resource construction failed. Recoverable: the failure is surfaced
    /// only to the caller whose acquire triggered construction, and later
    /// acquires may retry.
    #[error("Resource construction failed: {0}")]
    FactoryFailed(String),

    /// The acquire deadline elapsed before a resource became available.
    #[error("Timed out waiting for a pooled resource")]
    Timeout,

    /// The pool is shutting down; no new acquisitions are accepted.
    #[error("Pool is draining")]
    Draining,

    /// A resource was released that the pool does not recognize as
    /// checked out. Indicates a caller bug upstream of the pool.
    #[error("Released a resource the pool never checked out")]
    ProtocolViolation,
}

impl PoolError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            PoolError::Timeout | PoolError::Draining => 503,
            PoolError::FactoryFailed(_) | PoolError::ProtocolViolation => 500,
        }
    }
}
