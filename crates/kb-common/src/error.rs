/// Error types shared by every crate that talks to the knowledge-base backend.
///
/// Transport failures and non-2xx responses both count as network errors from the
/// caller's point of view; `is_network()` collapses them. Crate-specific errors
/// should wrap `StoreError` via `#[from]`.
pub use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl StoreError {
    /// True when the backend was unreachable or answered with a non-2xx status.
    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::Upstream { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}
