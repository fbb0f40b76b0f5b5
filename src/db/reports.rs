//! Report CRUD and claim operations.
//!
//! Updates are targeted: each method touches only the fields it names, so
//! concurrent writers never clobber unrelated fields (partial-update
//! semantics). The claim is a single guarded UPDATE — the idempotency check
//! and the claim itself cannot race.

use crate::error::DatabaseError;
use crate::types::{ReportId, ReportType, UserId};
use crate::{Error, Result};
use uuid::Uuid;

use super::{Database, Report};

const REPORT_COLUMNS: &str = r#"
    id, user_id, report_type, created_at,
    started_at, completed_at, failed_at, error_message,
    output_file_path, download_url, download_url_expires_at
"#;

impl Database {
    /// Insert a new report row in the requested state
    pub async fn create_report(
        &self,
        user_id: UserId,
        report_type: ReportType,
    ) -> Result<Report> {
        let id = ReportId(Uuid::new_v4());
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO reports (id, user_id, report_type, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.0)
        .bind(user_id.0)
        .bind(report_type.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert report: {}",
                e
            )))
        })?;

        self.fetch_report(id, user_id).await
    }

    /// Get a report scoped to its owner
    pub async fn get_report(&self, id: ReportId, user_id: UserId) -> Result<Option<Report>> {
        let row = sqlx::query_as::<_, Report>(&format!(
            "SELECT {} FROM reports WHERE id = ? AND user_id = ?",
            REPORT_COLUMNS
        ))
        .bind(id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get report: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Atomically claim a report for building
    ///
    /// Sets `started_at = now` and wipes every terminal-state field, so a
    /// build attempt always starts from a clean slate. The claim succeeds
    /// only when the report is unclaimed, or when it is still non-terminal
    /// and its previous claim is older than `claim_deadline_secs` (an
    /// abandoned attempt being reclaimed).
    ///
    /// Returns the claimed row, or `None` when the report is already
    /// claimed within the deadline or already terminal — the caller should
    /// treat that as "nothing to do".
    pub async fn claim_report(
        &self,
        id: ReportId,
        user_id: UserId,
        claim_deadline_secs: i64,
    ) -> Result<Option<Report>> {
        let now = chrono::Utc::now().timestamp();
        let reclaim_cutoff = now - claim_deadline_secs;

        let result = sqlx::query(
            r#"
            UPDATE reports SET
                started_at = ?,
                completed_at = NULL,
                failed_at = NULL,
                error_message = NULL,
                output_file_path = NULL,
                download_url = NULL,
                download_url_expires_at = NULL
            WHERE id = ? AND user_id = ?
              AND (
                started_at IS NULL
                OR (completed_at IS NULL AND failed_at IS NULL AND started_at <= ?)
              )
            "#,
        )
        .bind(now)
        .bind(id.0)
        .bind(user_id.0)
        .bind(reclaim_cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to claim report: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_report(id, user_id).await.map(Some)
    }

    /// Mark a report as completed with its output blob key
    pub async fn mark_completed(
        &self,
        id: ReportId,
        user_id: UserId,
        output_file_path: &str,
    ) -> Result<Report> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE reports SET output_file_path = ?, completed_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(output_file_path)
        .bind(now)
        .bind(id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark report completed: {}",
                e
            )))
        })?;

        self.fetch_report(id, user_id).await
    }

    /// Mark a report as failed with a human-readable error message
    pub async fn mark_failed(
        &self,
        id: ReportId,
        user_id: UserId,
        error_message: &str,
    ) -> Result<Report> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE reports SET failed_at = ?, error_message = ? WHERE id = ? AND user_id = ?",
        )
        .bind(now)
        .bind(error_message)
        .bind(id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to mark report failed: {}",
                e
            )))
        })?;

        self.fetch_report(id, user_id).await
    }

    /// Persist a freshly minted download link and its expiry
    pub async fn set_download_url(
        &self,
        id: ReportId,
        user_id: UserId,
        url: &str,
        expires_at: i64,
    ) -> Result<Report> {
        sqlx::query(
            "UPDATE reports SET download_url = ?, download_url_expires_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(url)
        .bind(expires_at)
        .bind(id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set download url: {}",
                e
            )))
        })?;

        self.fetch_report(id, user_id).await
    }

    /// Fetch a report that is known to exist (post-insert/post-update)
    async fn fetch_report(&self, id: ReportId, user_id: UserId) -> Result<Report> {
        self.get_report(id, user_id).await?.ok_or_else(|| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Report {} missing after write",
                id
            )))
        })
    }
}
