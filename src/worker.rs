//! Queue consumer and worker pool.
//!
//! One poller task long-polls the work queue and feeds a bounded intake
//! channel; N worker tasks pull from the channel and run the report builder.
//! The bridge is deliberately lossy toward the queue, never toward itself:
//! a message that doesn't fit the intake channel is simply not taken, stays
//! undeleted, and reappears after its visibility timeout. A message is
//! deleted only after its build succeeds — redelivery is the retry
//! mechanism. Malformed bodies are the one exception: they are logged and
//! acknowledged so a poison message cannot loop forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::builder::ReportBuilder;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::{QueueEntry, ReportQueue};
use crate::types::QueueMessage;

/// Bridges the work queue to the report builder with bounded concurrency
#[derive(Clone)]
pub struct Worker {
    config: Arc<Config>,
    builder: Arc<ReportBuilder>,
    queue: Arc<dyn ReportQueue>,
}

impl Worker {
    /// Create a worker from its injected collaborators
    pub fn new(
        config: Arc<Config>,
        builder: Arc<ReportBuilder>,
        queue: Arc<dyn ReportQueue>,
    ) -> Self {
        Self {
            config,
            builder,
            queue,
        }
    }

    /// Run the poller and worker pool until the shutdown token fires
    ///
    /// Spawns `queue.max_concurrency` worker tasks over an intake channel
    /// of the same capacity, then polls the queue on the current task.
    /// On shutdown the poller stops first; each worker finishes the message
    /// it is currently processing and exits. Entries accepted into the
    /// channel but not yet picked up are dropped undeleted, so the queue
    /// redelivers them. An in-flight build runs to its own completion or
    /// timeout, never interrupted mid-upload.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let capacity = self.config.queue.max_concurrency;
        let (tx, rx) = mpsc::channel::<QueueEntry>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(capacity);
        for worker_id in 0..capacity {
            let worker = self.clone();
            let intake = Arc::clone(&rx);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                worker.worker_loop(worker_id, intake, token).await;
            }));
        }

        tracing::info!(workers = capacity, "Worker pool started");
        self.poll_loop(tx, &shutdown).await;

        // tx dropped by poll_loop's exit; workers finish their current
        // message and observe either the closed channel or the token
        for handle in handles {
            let _ = handle.await;
        }

        tracing::info!("Worker pool stopped");
        Ok(())
    }

    /// Intake loop: long-poll the queue and feed the bounded channel
    async fn poll_loop(&self, tx: mpsc::Sender<QueueEntry>, shutdown: &CancellationToken) {
        let backoff = Duration::from_secs(self.config.queue.receive_backoff_secs);

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Poller stopping due to shutdown signal");
                    break;
                }
                received = self.queue.receive(
                    self.config.queue.max_batch_size,
                    self.config.queue.wait_time_secs,
                ) => received,
            };

            let entries = match received {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to receive messages, backing off");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            };

            if entries.is_empty() {
                tracing::debug!("No messages received, continuing to poll");
                continue;
            }

            if dispatch(&tx, entries) == 0 && tx.is_closed() {
                break;
            }
        }
    }

    /// One worker task: pull entries from the intake channel until shutdown
    async fn worker_loop(
        &self,
        worker_id: usize,
        intake: Arc<tokio::sync::Mutex<mpsc::Receiver<QueueEntry>>>,
        shutdown: CancellationToken,
    ) {
        tracing::info!(worker_id, "Worker started");

        loop {
            let entry = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(worker_id, "Worker stopping due to shutdown signal");
                    break;
                }
                entry = async { intake.lock().await.recv().await } => match entry {
                    Some(entry) => entry,
                    None => {
                        tracing::info!(worker_id, "Worker stopping, intake channel closed");
                        break;
                    }
                },
            };

            match self.process_entry(&entry).await {
                Ok(()) => {
                    // Only now is the message removed from the queue
                    if let Some(receipt) = entry.receipt_handle.as_deref() {
                        if let Err(e) = self.queue.delete(receipt).await {
                            tracing::error!(worker_id, error = %e, "Failed to delete message");
                        }
                    }
                }
                Err(e) => {
                    // Leave the message for redelivery after its visibility timeout
                    tracing::error!(worker_id, error = %e, "Failed to process message");
                }
            }
        }
    }

    /// Decode one entry and run the builder under the build timeout
    ///
    /// `Ok(())` means the message is handled and may be acknowledged; that
    /// includes empty or undecodable bodies, which are dropped by design
    /// rather than redelivered forever.
    async fn process_entry(&self, entry: &QueueEntry) -> Result<()> {
        let body = match entry.body.as_deref() {
            Some(body) if !body.is_empty() => body,
            _ => {
                tracing::warn!("Discarding queue entry with empty body");
                return Ok(());
            }
        };

        let message: QueueMessage = match serde_json::from_str(body) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable queue entry");
                return Ok(());
            }
        };

        tracing::info!(
            report_id = %message.report_id,
            user_id = %message.user_id,
            "Processing build request"
        );

        let report = tokio::time::timeout(
            self.config.build_timeout(),
            self.builder.build_report(message.user_id, message.report_id),
        )
        .await
        .map_err(|_| Error::BuildTimeout(self.config.builder.build_timeout_secs))??;

        tracing::info!(
            report_id = %message.report_id,
            status = %report.status(),
            "Build request processed"
        );

        Ok(())
    }
}

/// Offer entries to the intake channel without blocking
///
/// Entries that don't fit are dropped from the intake (not deleted from the
/// queue) so the poll loop never blocks on busy workers; the queue's
/// visibility timeout redelivers them later. Returns how many were accepted.
fn dispatch(tx: &mpsc::Sender<QueueEntry>, entries: Vec<QueueEntry>) -> usize {
    let mut accepted = 0;
    for entry in entries {
        match tx.try_send(entry) {
            Ok(()) => accepted += 1,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Intake channel full, leaving message for redelivery");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
    accepted
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        StubBlobStore, StubFetcher, StubQueue, sample_entries, test_builder, test_config,
        test_database,
    };
    use crate::types::{ReportId, ReportStatus, ReportType, UserId};

    fn entry(body: Option<&str>, receipt: &str) -> QueueEntry {
        QueueEntry {
            body: body.map(|b| b.to_string()),
            receipt_handle: Some(receipt.to_string()),
        }
    }

    async fn test_worker(queue: Arc<StubQueue>) -> (Worker, Arc<crate::db::Database>, tempfile::NamedTempFile) {
        let (db, guard) = test_database().await;
        let fetcher = Arc::new(StubFetcher::with_records(sample_entries()));
        let blob = Arc::new(StubBlobStore::new());
        let builder = Arc::new(test_builder(db.clone(), fetcher, blob));
        let worker = Worker::new(Arc::new(test_config()), builder, queue);
        (worker, db, guard)
    }

    #[test]
    fn test_dispatch_accepts_up_to_capacity() {
        let (tx, mut rx) = mpsc::channel::<QueueEntry>(2);

        let entries = (0..5).map(|i| entry(Some("{}"), &format!("r{i}"))).collect();
        let accepted = dispatch(&tx, entries);

        assert_eq!(accepted, 2, "only capacity-many entries fit");
        assert_eq!(rx.try_recv().unwrap().receipt_handle.as_deref(), Some("r0"));
        assert_eq!(rx.try_recv().unwrap().receipt_handle.as_deref(), Some("r1"));
        assert!(rx.try_recv().is_err(), "overflow entries are not queued");
    }

    #[tokio::test]
    async fn test_process_entry_acks_empty_body() {
        let queue = Arc::new(StubQueue::empty());
        let (worker, _db, _guard) = test_worker(queue).await;

        // Empty and missing bodies are handled (and therefore acked), not errors
        worker.process_entry(&entry(Some(""), "r1")).await.unwrap();
        worker.process_entry(&entry(None, "r2")).await.unwrap();
    }

    #[tokio::test]
    async fn test_process_entry_acks_undecodable_body() {
        let queue = Arc::new(StubQueue::empty());
        let (worker, _db, _guard) = test_worker(queue).await;

        worker
            .process_entry(&entry(Some("not json at all"), "r1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_processes_message_and_deletes_it() {
        let (db, _guard) = test_database().await;
        let user = UserId(uuid::Uuid::new_v4());
        let report = db.create_report(user, ReportType::Monsters).await.unwrap();
        let id = ReportId(report.id);

        let body = serde_json::to_string(&QueueMessage {
            report_id: id,
            user_id: user,
        })
        .unwrap();
        let queue = Arc::new(StubQueue::with_batches(vec![vec![entry(
            Some(&body),
            "receipt-1",
        )]]));

        let fetcher = Arc::new(StubFetcher::with_records(sample_entries()));
        let blob = Arc::new(StubBlobStore::new());
        let builder = Arc::new(test_builder(db.clone(), fetcher, blob));
        let worker = Worker::new(Arc::new(test_config()), builder, queue.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = worker.clone();
            let token = shutdown.clone();
            async move { worker.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        let stored = db.get_report(id, user).await.unwrap().unwrap();
        assert_eq!(stored.status(), ReportStatus::Completed);
        assert_eq!(queue.deleted(), vec!["receipt-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_build_leaves_message_undeleted() {
        // Message references a report that doesn't exist, so the build fails
        let body = serde_json::to_string(&QueueMessage {
            report_id: ReportId(uuid::Uuid::new_v4()),
            user_id: UserId(uuid::Uuid::new_v4()),
        })
        .unwrap();
        let queue = Arc::new(StubQueue::with_batches(vec![vec![entry(
            Some(&body),
            "receipt-1",
        )]]));
        let (worker, _db, _guard) = test_worker(queue.clone()).await;

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = worker.clone();
            let token = shutdown.clone();
            async move { worker.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert!(
            queue.deleted().is_empty(),
            "failed message must stay for redelivery"
        );
    }

    #[tokio::test]
    async fn test_process_entry_surfaces_build_timeout() {
        let (db, _guard) = test_database().await;
        let user = UserId(uuid::Uuid::new_v4());
        let report = db.create_report(user, ReportType::Monsters).await.unwrap();
        let body = serde_json::to_string(&QueueMessage {
            report_id: ReportId(report.id),
            user_id: user,
        })
        .unwrap();

        let fetcher = Arc::new(StubFetcher::slow(sample_entries(), Duration::from_secs(5)));
        let blob = Arc::new(StubBlobStore::new());
        let builder = Arc::new(test_builder(db.clone(), fetcher, blob));
        let mut config = test_config();
        config.builder.build_timeout_secs = 1;
        let worker = Worker::new(
            Arc::new(config),
            builder,
            Arc::new(StubQueue::empty()),
        );

        let err = worker
            .process_entry(&entry(Some(&body), "receipt-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BuildTimeout(1)));
    }

    #[tokio::test]
    async fn test_timed_out_build_leaves_message_undeleted() {
        let (db, _guard) = test_database().await;
        let user = UserId(uuid::Uuid::new_v4());
        let report = db.create_report(user, ReportType::Monsters).await.unwrap();
        let id = ReportId(report.id);
        let body = serde_json::to_string(&QueueMessage {
            report_id: id,
            user_id: user,
        })
        .unwrap();
        let queue = Arc::new(StubQueue::with_batches(vec![vec![entry(
            Some(&body),
            "receipt-1",
        )]]));

        let fetcher = Arc::new(StubFetcher::slow(sample_entries(), Duration::from_secs(5)));
        let blob = Arc::new(StubBlobStore::new());
        let builder = Arc::new(test_builder(db.clone(), fetcher, blob.clone()));
        let mut config = test_config();
        config.builder.build_timeout_secs = 1;
        let worker = Worker::new(Arc::new(config), builder, queue.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = worker.clone();
            let token = shutdown.clone();
            async move { worker.run(token).await }
        });

        // Long enough for the 1s timeout to fire, well short of the fetch
        tokio::time::sleep(Duration::from_millis(1400)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert!(
            queue.deleted().is_empty(),
            "timed-out message must stay for redelivery"
        );
        assert!(blob.puts().is_empty());
        let stored = db.get_report(id, user).await.unwrap().unwrap();
        assert_eq!(stored.status(), ReportStatus::Processing);
    }

    #[tokio::test]
    async fn test_overflow_messages_are_never_deleted_in_poll_cycle() {
        let (db, _guard) = test_database().await;
        let user = UserId(uuid::Uuid::new_v4());

        // Three valid messages, worker capacity of one
        let mut batch = Vec::new();
        for i in 0..3 {
            let report = db.create_report(user, ReportType::Monsters).await.unwrap();
            let body = serde_json::to_string(&QueueMessage {
                report_id: ReportId(report.id),
                user_id: user,
            })
            .unwrap();
            batch.push(entry(Some(&body), &format!("receipt-{i}")));
        }
        let queue = Arc::new(StubQueue::with_batches(vec![batch]));

        let fetcher = Arc::new(StubFetcher::with_records(sample_entries()));
        let blob = Arc::new(StubBlobStore::new());
        let builder = Arc::new(test_builder(db.clone(), fetcher, blob));
        let mut config = test_config();
        config.queue.max_concurrency = 1;
        let worker = Worker::new(Arc::new(config), builder, queue.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = worker.clone();
            let token = shutdown.clone();
            async move { worker.run(token).await }
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
        handle.await.unwrap().unwrap();

        // Only the message that fit the intake channel was processed and
        // acked; the overflow stays in the queue for redelivery
        let deleted = queue.deleted();
        assert_eq!(deleted, vec!["receipt-0".to_string()]);
    }
}
