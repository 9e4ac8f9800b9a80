//! Error types for mailsense.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox capability errors (listing, fetching, body decoding).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to list messages: {0}")]
    ListFailed(String),

    #[error("Failed to fetch message {id}: {reason}")]
    FetchFailed { id: String, reason: String },

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Enrichment service errors.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("Enrichment request failed: {0}")]
    RequestFailed(String),

    #[error("Enrichment service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty completion from enrichment service")]
    EmptyResponse,

    #[error("Malformed enrichment response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Pipeline-level errors. Per-message failures are absorbed by the
/// dispatcher; only conditions that prevent any forward progress land here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to list candidate messages: {0}")]
    Listing(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
