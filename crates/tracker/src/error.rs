use thiserror::Error;

use domain::models::EntityId;

/// Errors raised while fetching data from the tracking backend.
///
/// All of them are transient from the session's point of view: the next
/// refresh or polling tick retries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No entities selected")]
    NoEntities,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Backend returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("Fetch for entity {0} did not complete")]
    Aborted(EntityId),
}

impl FetchError {
    /// Whether retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::NoEntities => false,
            FetchError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            FetchError::InvalidResponse { .. } => false,
            FetchError::Http(_) | FetchError::Timeout(_) | FetchError::Aborted(_) => true,
        }
    }
}

/// Errors raised while talking to the map surface.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to encode map message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write map message: {0}")]
    Io(#[from] std::io::Error),

    #[error("Map surface is closed")]
    SurfaceClosed,
}

/// Errors returned by a session handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Tracking session has shut down")]
    Closed,
}
