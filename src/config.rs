//! Configuration types for csv-reporter

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// AWS connectivity configuration
///
/// Region and optional endpoint overrides. The endpoint overrides exist so
/// the library can run against localstack in development and tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region (falls back to the environment's default provider chain)
    #[serde(default)]
    pub region: Option<String>,

    /// S3 endpoint override (e.g. a localstack URL)
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// SQS endpoint override (e.g. a localstack URL)
    #[serde(default)]
    pub sqs_endpoint: Option<String>,
}

/// Work queue configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name, resolved to a queue URL at startup (default: "reports")
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Maximum messages fetched per long poll (default: 10, SQS cap)
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: i32,

    /// Long-poll wait in seconds (default: 20, SQS cap)
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: i32,

    /// Number of concurrent worker tasks, which is also the intake channel
    /// capacity (default: 4)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Sleep after a failed receive before polling again (default: 1s)
    #[serde(default = "default_receive_backoff_secs")]
    pub receive_backoff_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            max_batch_size: default_max_batch_size(),
            wait_time_secs: default_wait_time_secs(),
            max_concurrency: default_max_concurrency(),
            receive_backoff_secs: default_receive_backoff_secs(),
        }
    }
}

/// Blob storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding generated report files (default: "reports")
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Validity window for presigned download links in seconds (default: 600)
    #[serde(default = "default_download_url_ttl_secs")]
    pub download_url_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            download_url_ttl_secs: default_download_url_ttl_secs(),
        }
    }
}

/// Report builder configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Per-build execution timeout in seconds (default: 10)
    ///
    /// Independent of the process-wide shutdown signal: an in-flight build
    /// runs to its own completion or timeout.
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    /// Claim reclaim deadline in seconds (default: 20, 2x the build timeout)
    ///
    /// A report still marked processing whose claim is older than this is
    /// treated as abandoned and may be claimed again, so a crashed attempt
    /// cannot stall the report forever.
    #[serde(default = "default_claim_deadline_secs")]
    pub claim_deadline_secs: i64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            build_timeout_secs: default_build_timeout_secs(),
            claim_deadline_secs: default_claim_deadline_secs(),
        }
    }
}

/// Upstream compendium source configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the compendium API
    #[serde(default = "default_source_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_source_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            request_timeout_secs: default_source_timeout_secs(),
        }
    }
}

/// Local persistence configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite database file (default: "./csv-reporter.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration for csv-reporter
///
/// Fields are organized into logical sub-configs:
/// - [`aws`](AwsConfig) — region and endpoint overrides
/// - [`queue`](QueueConfig) — queue name, polling, worker concurrency
/// - [`storage`](StorageConfig) — bucket and download link TTL
/// - [`builder`](BuilderConfig) — build timeout and claim deadline
/// - [`source`](SourceConfig) — upstream compendium endpoint
/// - [`persistence`](PersistenceConfig) — database path
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// AWS connectivity
    #[serde(default)]
    pub aws: AwsConfig,

    /// Work queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Blob storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Report builder settings
    #[serde(default)]
    pub builder: BuilderConfig,

    /// Upstream source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Local persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Validate the configuration, returning the first problem found
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.queue.queue_name.is_empty() {
            return Err(crate::error::Error::Config {
                message: "queue name must not be empty".to_string(),
                key: Some("queue.queue_name".to_string()),
            });
        }
        if self.queue.max_concurrency == 0 {
            return Err(crate::error::Error::Config {
                message: "worker concurrency must be at least 1".to_string(),
                key: Some("queue.max_concurrency".to_string()),
            });
        }
        if !(1..=10).contains(&self.queue.max_batch_size) {
            return Err(crate::error::Error::Config {
                message: "receive batch size must be between 1 and 10".to_string(),
                key: Some("queue.max_batch_size".to_string()),
            });
        }
        if !(0..=20).contains(&self.queue.wait_time_secs) {
            return Err(crate::error::Error::Config {
                message: "long-poll wait must be between 0 and 20 seconds".to_string(),
                key: Some("queue.wait_time_secs".to_string()),
            });
        }
        if self.storage.bucket.is_empty() {
            return Err(crate::error::Error::Config {
                message: "bucket must not be empty".to_string(),
                key: Some("storage.bucket".to_string()),
            });
        }
        if self.storage.download_url_ttl_secs == 0 {
            return Err(crate::error::Error::Config {
                message: "download link TTL must be at least 1 second".to_string(),
                key: Some("storage.download_url_ttl_secs".to_string()),
            });
        }
        if self.builder.build_timeout_secs == 0 {
            return Err(crate::error::Error::Config {
                message: "build timeout must be at least 1 second".to_string(),
                key: Some("builder.build_timeout_secs".to_string()),
            });
        }
        if self.builder.claim_deadline_secs < self.builder.build_timeout_secs as i64 {
            return Err(crate::error::Error::Config {
                message: "claim deadline must not be shorter than the build timeout".to_string(),
                key: Some("builder.claim_deadline_secs".to_string()),
            });
        }
        Ok(())
    }

    /// Per-build execution timeout as a [`Duration`]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.builder.build_timeout_secs)
    }

    /// Download link validity window as a [`Duration`]
    pub fn download_url_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.download_url_ttl_secs)
    }
}

fn default_queue_name() -> String {
    "reports".to_string()
}

fn default_max_batch_size() -> i32 {
    10
}

fn default_wait_time_secs() -> i32 {
    20
}

fn default_max_concurrency() -> usize {
    4
}

fn default_receive_backoff_secs() -> u64 {
    1
}

fn default_bucket() -> String {
    "reports".to_string()
}

fn default_download_url_ttl_secs() -> u64 {
    600
}

fn default_build_timeout_secs() -> u64 {
    10
}

fn default_claim_deadline_secs() -> i64 {
    20
}

fn default_source_base_url() -> String {
    "https://botw-compendium.herokuapp.com/api/v3/compendium".to_string()
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./csv-reporter.db")
}
