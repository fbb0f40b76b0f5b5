//! Error types for csv-reporter
//!
//! This module provides error handling for the library:
//! - A top-level [`Error`] used by every public operation
//! - Domain-specific sub-enums (database, fetch, storage, queue)
//! - The crate-wide [`Result`] alias

use thiserror::Error;

/// Result type alias for csv-reporter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for csv-reporter
///
/// Errors raised before a report is claimed never mutate report state;
/// errors raised after a successful claim are persisted onto the report
/// (`failed_at` + `error_message`) before being returned.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "queue_name")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Report lookup missed — non-retryable, no state mutation
    #[error("report not found: {0}")]
    NotFound(String),

    /// Upstream data source failure or empty result
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Blob storage failure (upload, presign)
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Work queue failure (receive, delete, send)
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Report build exceeded its execution timeout
    #[error("report build timed out after {0} seconds")]
    BuildTimeout(u64),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Database migration failed
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Source fetch errors
///
/// The fetch contract treats an empty result set as a failure: a report
/// built from zero records is never valid.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream returned a non-success HTTP status
    #[error("upstream returned status {status} for {category}")]
    UpstreamStatus {
        /// HTTP status code from the upstream
        status: u16,
        /// Compendium category that was requested
        category: String,
    },

    /// Upstream request failed before a response was received
    #[error("request to upstream failed: {0}")]
    RequestFailed(String),

    /// Upstream response body could not be decoded
    #[error("failed to decode upstream response: {0}")]
    DecodeFailed(String),

    /// Upstream returned zero records
    #[error("no {0} records found")]
    NoRecords(String),
}

/// Blob storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// CSV row serialization failed
    #[error("failed to write CSV: {0}")]
    CsvWrite(String),

    /// Gzip stream could not be finalized
    #[error("failed to finalize gzip stream: {0}")]
    GzipFinalize(String),

    /// S3 PutObject error
    #[error("failed to upload object {key}: {message}")]
    PutObject {
        /// Blob key being uploaded
        key: String,
        /// Underlying SDK error description
        message: String,
    },

    /// S3 presign error
    #[error("failed to presign object {key}: {message}")]
    Presign {
        /// Blob key being presigned
        key: String,
        /// Underlying SDK error description
        message: String,
    },
}

/// Work queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue URL could not be resolved from the queue name
    #[error("failed to resolve queue URL for {queue}: {message}")]
    ResolveUrl {
        /// Configured queue name
        queue: String,
        /// Underlying SDK error description
        message: String,
    },

    /// ReceiveMessage call failed
    #[error("failed to receive messages: {0}")]
    Receive(String),

    /// DeleteMessage call failed
    #[error("failed to delete message: {0}")]
    Delete(String),

    /// SendMessage call failed
    #[error("failed to send message: {0}")]
    Send(String),
}
