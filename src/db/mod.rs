//! Database layer for csv-reporter
//!
//! Handles SQLite persistence for report rows.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`reports`] — Report CRUD and claim semantics

use crate::types::ReportStatus;
use sqlx::{FromRow, sqlite::SqlitePool};
use uuid::Uuid;

mod migrations;
mod reports;

/// Report record from database
///
/// Timestamps are Unix seconds; each lifecycle timestamp is NULL until set.
/// Status is not stored — it is a pure projection of timestamp presence
/// (see [`Report::status`]).
#[derive(Debug, Clone, FromRow)]
pub struct Report {
    /// Unique report id
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Report type ("monsters", "weapons", "armor")
    pub report_type: String,
    /// Unix timestamp when the report was requested (immutable)
    pub created_at: i64,
    /// Unix timestamp when a worker claimed the build
    pub started_at: Option<i64>,
    /// Unix timestamp when the build succeeded
    pub completed_at: Option<i64>,
    /// Unix timestamp when the build failed
    pub failed_at: Option<i64>,
    /// Human-readable failure description, set alongside `failed_at`
    pub error_message: Option<String>,
    /// Blob key of the uploaded file, set on success
    pub output_file_path: Option<String>,
    /// Cached presigned download link
    pub download_url: Option<String>,
    /// Unix timestamp when the cached link expires
    pub download_url_expires_at: Option<i64>,
}

impl Report {
    /// Project the lifecycle status from timestamp presence
    ///
    /// Completion is checked before failure: if both timestamps are ever
    /// inconsistently set, the report reads as completed.
    pub fn status(&self) -> ReportStatus {
        if self.started_at.is_none() {
            ReportStatus::Requested
        } else if self.completed_at.is_none() && self.failed_at.is_none() {
            ReportStatus::Processing
        } else if self.completed_at.is_some() {
            ReportStatus::Completed
        } else if self.failed_at.is_some() {
            ReportStatus::Failed
        } else {
            // Unreachable: the arms above cover every presence combination
            ReportStatus::Unknown
        }
    }
}

/// Database handle for csv-reporter
pub struct Database {
    pool: SqlitePool,
}
