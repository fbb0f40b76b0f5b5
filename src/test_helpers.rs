//! Shared test fixtures: in-memory stub collaborators and a scratch database.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::blob::BlobStore;
use crate::builder::ReportBuilder;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, FetchError, Result, StorageError};
use crate::fetcher::SourceFetcher;
use crate::queue::{QueueEntry, ReportQueue};
use crate::types::{CompendiumEntry, ReportType};

/// Open a fresh migrated database on a temp file
///
/// The guard must be kept alive for the duration of the test.
pub(crate) async fn test_database() -> (Arc<Database>, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let db = Database::new(file.path()).await.unwrap();
    (Arc::new(db), file)
}

/// Default configuration with test-friendly timings
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.queue.wait_time_secs = 1;
    config.queue.receive_backoff_secs = 1;
    config
}

/// Wire a builder from stub collaborators
pub(crate) fn test_builder(
    db: Arc<Database>,
    fetcher: Arc<dyn SourceFetcher>,
    blob: Arc<dyn BlobStore>,
) -> ReportBuilder {
    ReportBuilder::new(db, fetcher, blob, Arc::new(test_config()))
}

/// Two compendium records whose CSV rendering is asserted in builder tests
pub(crate) fn sample_entries() -> Vec<CompendiumEntry> {
    vec![
        CompendiumEntry {
            name: "bokoblin".to_string(),
            id: 108,
            category: "monsters".to_string(),
            description: "A common monster".to_string(),
            image: "https://img.example/bokoblin.png".to_string(),
            common_locations: vec!["Hyrule Field".to_string(), "Akkala".to_string()],
            drops: vec!["bokoblin horn".to_string()],
            dlc: false,
        },
        CompendiumEntry {
            name: "silver lynel".to_string(),
            id: 123,
            category: "monsters".to_string(),
            description: "A fearsome monster".to_string(),
            image: "https://img.example/lynel.png".to_string(),
            common_locations: vec![],
            drops: vec![],
            dlc: true,
        },
    ]
}

/// Canned source fetcher counting its invocations
pub(crate) struct StubFetcher {
    records: Vec<CompendiumEntry>,
    fail_with: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn with_records(records: Vec<CompendiumEntry>) -> Self {
        Self {
            records,
            fail_with: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            records: Vec::new(),
            fail_with: Some(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fetcher that sleeps before answering, for exercising build timeouts
    pub(crate) fn slow(records: Vec<CompendiumEntry>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_records(records)
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch(&self, report_type: ReportType) -> Result<Vec<CompendiumEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(Error::Fetch(FetchError::RequestFailed(message.clone())));
        }
        if self.records.is_empty() {
            return Err(Error::Fetch(FetchError::NoRecords(report_type.to_string())));
        }
        Ok(self.records.clone())
    }
}

/// In-memory blob store recording uploads and minting distinct URLs
pub(crate) struct StubBlobStore {
    puts: Mutex<Vec<(String, Vec<u8>)>>,
    presigns: AtomicUsize,
    fail_puts: bool,
}

impl StubBlobStore {
    pub(crate) fn new() -> Self {
        Self {
            puts: Mutex::new(Vec::new()),
            presigns: AtomicUsize::new(0),
            fail_puts: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Self::new()
        }
    }

    pub(crate) fn puts(&self) -> Vec<(String, Vec<u8>)> {
        self.puts.lock().unwrap().clone()
    }

    pub(crate) fn presigns(&self) -> usize {
        self.presigns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for StubBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if self.fail_puts {
            return Err(Error::Storage(StorageError::PutObject {
                key: key.to_string(),
                message: "stub upload failure".to_string(),
            }));
        }
        self.puts.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        let n = self.presigns.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://signed.example/{key}?expires={}&sig={n}",
            ttl.as_secs()
        ))
    }
}

/// Scripted queue: hands out preloaded batches, then nothing
///
/// Records deleted receipt handles and sent bodies for assertions.
pub(crate) struct StubQueue {
    batches: Mutex<VecDeque<Vec<QueueEntry>>>,
    deleted: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
}

impl StubQueue {
    pub(crate) fn empty() -> Self {
        Self::with_batches(Vec::new())
    }

    pub(crate) fn with_batches(batches: Vec<Vec<QueueEntry>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            deleted: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportQueue for StubQueue {
    async fn receive(&self, _max_messages: i32, _wait_time_secs: i32) -> Result<Vec<QueueEntry>> {
        let batch = self.batches.lock().unwrap().pop_front();
        match batch {
            Some(batch) => Ok(batch),
            None => {
                // Simulate long-poll latency so callers don't spin
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn send(&self, body: &str) -> Result<()> {
        self.sent.lock().unwrap().push(body.to_string());
        Ok(())
    }
}
