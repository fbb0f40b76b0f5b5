//! # csv-reporter
//!
//! Queue-driven CSV report generation backend.
//!
//! ## Design Philosophy
//!
//! csv-reporter is designed to be:
//! - **Library-first** - No CLI or HTTP surface, purely a Rust crate for embedding
//! - **At-least-once safe** - Redelivered build messages never double-build a report
//! - **Self-healing** - A crashed build attempt is reclaimed after its deadline
//! - **Pluggable at the seams** - Source, blob store, and queue are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use csv_reporter::{
//!     CompendiumClient, Config, Database, ReportBuilder, S3BlobStore, SqsQueue, Worker,
//!     run_with_shutdown,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::default());
//!     config.validate()?;
//!
//!     let db = Arc::new(Database::new(&config.persistence.database_path).await?);
//!     let fetcher = Arc::new(CompendiumClient::new(&config.source)?);
//!     let blob = Arc::new(S3BlobStore::new(&config.aws, &config.storage.bucket).await);
//!     let queue = Arc::new(SqsQueue::connect(&config.aws, &config.queue.queue_name).await?);
//!
//!     let builder = Arc::new(ReportBuilder::new(db, fetcher, blob, config.clone()));
//!     let worker = Worker::new(config, builder, queue);
//!
//!     run_with_shutdown(worker).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Blob storage for generated report files
pub mod blob;
/// Report building state machine
pub mod builder;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Upstream compendium source fetching
pub mod fetcher;
/// Work queue access
pub mod queue;
/// Request-side report API
pub mod service;
/// Core types
pub mod types;
/// Queue consumer and worker pool
pub mod worker;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use blob::{BlobStore, S3BlobStore};
pub use builder::ReportBuilder;
pub use config::{
    AwsConfig, BuilderConfig, Config, PersistenceConfig, QueueConfig, SourceConfig, StorageConfig,
};
pub use db::{Database, Report};
pub use error::{DatabaseError, Error, FetchError, QueueError, Result, StorageError};
pub use fetcher::{CompendiumClient, SourceFetcher};
pub use queue::{QueueEntry, ReportQueue, SqsQueue};
pub use service::ReportService;
pub use types::{CompendiumEntry, QueueMessage, ReportId, ReportStatus, ReportType, UserId};
pub use worker::Worker;

/// Helper function to run the worker with graceful signal handling.
///
/// Runs the worker pool until a termination signal arrives, then cancels it
/// and waits for in-flight builds to finish.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(worker: Worker) -> Result<()> {
    let shutdown = tokio_util::sync::CancellationToken::new();

    let handle = tokio::spawn({
        let worker = worker.clone();
        let token = shutdown.clone();
        async move { worker.run(token).await }
    });

    wait_for_signal().await;
    shutdown.cancel();

    match handle.await {
        Ok(result) => result,
        Err(e) => Err(Error::Other(format!("worker task panicked: {}", e))),
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
