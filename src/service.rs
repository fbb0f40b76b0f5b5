//! Report lifecycle front door: request creation and retrieval.
//!
//! `create_report` records the request and enqueues a build message;
//! `get_report` returns the current row and, for completed reports,
//! lazily mints or refreshes the presigned download link. Links are
//! cached on the row with an absolute expiry so repeated reads inside
//! the validity window reuse the same URL instead of re-signing.

use std::sync::Arc;

use chrono::Utc;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::db::{Database, Report};
use crate::error::{Error, Result};
use crate::queue::ReportQueue;
use crate::types::{QueueMessage, ReportId, ReportStatus, ReportType, UserId};

/// Request-side API over the report store, queue, and blob store
pub struct ReportService {
    db: Arc<Database>,
    blob: Arc<dyn BlobStore>,
    queue: Arc<dyn ReportQueue>,
    config: Arc<Config>,
}

impl ReportService {
    /// Create a service from its injected collaborators
    pub fn new(
        db: Arc<Database>,
        blob: Arc<dyn BlobStore>,
        queue: Arc<dyn ReportQueue>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            blob,
            queue,
            config,
        }
    }

    /// Record a new report request and enqueue its build message
    ///
    /// The row is created first so a consumer can never dequeue a message
    /// for a report that doesn't exist yet.
    pub async fn create_report(&self, user_id: UserId, report_type: ReportType) -> Result<Report> {
        let report = self.db.create_report(user_id, report_type).await?;

        let message = QueueMessage {
            report_id: ReportId(report.id),
            user_id,
        };
        self.queue.send(&serde_json::to_string(&message)?).await?;

        tracing::info!(
            report_id = %report.id,
            user_id = %user_id,
            report_type = %report_type,
            "Report requested and build message enqueued"
        );

        Ok(report)
    }

    /// Fetch a report, refreshing its download link if needed
    ///
    /// Non-completed reports are returned as stored. For a completed report
    /// a missing or expired download link is replaced with a freshly
    /// presigned one and persisted before returning.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no report with this id exists for this user.
    pub async fn get_report(&self, user_id: UserId, report_id: ReportId) -> Result<Report> {
        let report = self
            .db
            .get_report(report_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} for user {}", report_id, user_id)))?;

        if report.status() != ReportStatus::Completed {
            return Ok(report);
        }

        let now = Utc::now().timestamp();
        let link_valid = report.download_url.is_some()
            && report.download_url_expires_at.is_some_and(|at| at > now);
        if link_valid {
            return Ok(report);
        }

        let key = report.output_file_path.as_deref().ok_or_else(|| {
            // Completed rows always carry their output key; a miss here is
            // a stored-state corruption worth surfacing loudly
            Error::Other(format!("completed report {} has no output file", report_id))
        })?;

        let ttl = self.config.download_url_ttl();
        let url = self.blob.presign(key, ttl).await?;
        let expires_at = now + ttl.as_secs() as i64;

        tracing::debug!(
            report_id = %report_id,
            expires_at,
            "Minted fresh download link"
        );

        self.db
            .set_download_url(report_id, user_id, &url, expires_at)
            .await
    }
}
