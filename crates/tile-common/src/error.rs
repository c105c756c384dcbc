//! Error types for tileserv request handling.

use thiserror::Error;

/// Result type alias using TileError.
pub type TileResult<T> = Result<T, TileError>;

/// Per-request error type for tile dispatch.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("Invalid tile address: {0}")]
    InvalidAddress(String),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TileError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TileError::InvalidAddress(_) => 400,
            TileError::RenderFailed(_) | TileError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(TileError::InvalidAddress("x".into()).http_status_code(), 400);
        assert_eq!(TileError::RenderFailed("x".into()).http_status_code(), 500);
        assert_eq!(TileError::Internal("x".into()).http_status_code(), 500);
    }
}
