//! Error taxonomy for a watch cycle.
//!
//! Each stage owns its error type so the coordinator can decide, per stage,
//! whether a failure ends the cycle or is merely counted.

/// Missing or malformed process configuration. Fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// The rendering engine failed to produce or read a document.
///
/// An empty match set is not a failure; only engine faults end up here.
#[derive(thiserror::Error, Debug)]
pub enum RenderFailure {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("query `{query}` failed: {reason}")]
    Evaluation { query: String, reason: String },

    #[error("session teardown failed: {0}")]
    Teardown(String),
}

/// A single message could not be sent or deleted.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryFailure {
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport rejected the request ({code}): {description}")]
    Rejected { code: i64, description: String },

    #[error("malformed transport response: {0}")]
    Malformed(String),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a cycle ended without completing.
#[derive(thiserror::Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Render(#[from] RenderFailure),

    #[error(transparent)]
    Delivery(#[from] DeliveryFailure),
}

/// Result alias for cycle-level operations.
pub type CycleResult<T> = std::result::Result<T, CycleError>;
