use thiserror::Error;

/// Error types for MCMA client operations
#[derive(Error, Debug)]
pub enum McmaClientError {
    /// Invalid or missing client-side configuration; fails fast, never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No authenticator or resource endpoint registered for a requested name
    #[error("{0}")]
    NotFound(String),

    /// Connectivity failure from the underlying HTTP stack, surfaced after retries
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Terminal non-2xx response from a remote service
    #[error("{method} {url} returned {status}: {body}")]
    Remote {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Retries exhausted while the service kept answering 5xx/429
    #[error("failed to {method} {url} after {elapsed_ms} ms, last status {status}: {body}")]
    RetriesExhausted {
        method: String,
        url: String,
        status: u16,
        body: String,
        elapsed_ms: u128,
    },

    /// Error while encoding or decoding JSON
    #[error("failed to process json: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every endpoint matched by a query fan-out failed
    #[error("all matching resource endpoints failed:\n{0}")]
    QueryFanout(String),
}
