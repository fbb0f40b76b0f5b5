//! Report building — the claim/build/finalize state machine.
//!
//! `build_report` drives one attempt end to end: look the report up, claim
//! it, fetch the source records, encode them as gzip-compressed CSV, upload
//! the blob, and persist the outcome. Errors before the claim never touch
//! report state; every error after the claim is finalized onto the row
//! (`failed_at` + `error_message`) before it is returned, so the stored
//! state and the caller's error always agree.

use std::io::Write;
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::blob::BlobStore;
use crate::config::Config;
use crate::db::{Database, Report};
use crate::error::{Error, FetchError, Result, StorageError};
use crate::fetcher::SourceFetcher;
use crate::types::{CompendiumEntry, ReportId, ReportType, UserId};

/// CSV column order — part of the output contract, consumed downstream
const CSV_HEADER: [&str; 8] = [
    "name",
    "id",
    "category",
    "description",
    "image",
    "common_locations",
    "drops",
    "dlc",
];

/// Blob key for a report's output file
pub fn output_key(user_id: UserId, report_id: ReportId) -> String {
    format!("users/{}/reports/{}.csv.gz", user_id, report_id)
}

/// Builds reports: fetch, transform, compress, upload, finalize
pub struct ReportBuilder {
    db: Arc<Database>,
    fetcher: Arc<dyn SourceFetcher>,
    blob: Arc<dyn BlobStore>,
    config: Arc<Config>,
}

impl ReportBuilder {
    /// Create a builder from its injected collaborators
    pub fn new(
        db: Arc<Database>,
        fetcher: Arc<dyn SourceFetcher>,
        blob: Arc<dyn BlobStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            fetcher,
            blob,
            config,
        }
    }

    /// Run one build attempt for the report
    ///
    /// Idempotent under redelivery: if the report is already claimed within
    /// the claim deadline, or already terminal, the current row is returned
    /// unchanged and no fetch or upload happens. A stale claim (older than
    /// the configured deadline, still non-terminal) is reclaimed, so a
    /// crashed attempt cannot stall the report forever.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the report doesn't exist for this user (no
    /// state mutation); otherwise any post-claim failure, after it has been
    /// persisted onto the report.
    pub async fn build_report(&self, user_id: UserId, report_id: ReportId) -> Result<Report> {
        let report = self
            .db
            .get_report(report_id, user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} for user {}", report_id, user_id)))?;

        let claimed = match self
            .db
            .claim_report(report_id, user_id, self.config.builder.claim_deadline_secs)
            .await?
        {
            Some(claimed) => claimed,
            None => {
                tracing::info!(
                    report_id = %report_id,
                    status = %report.status(),
                    "Report already claimed or terminal, skipping build"
                );
                return Ok(report);
            }
        };

        // Claim succeeded: any error from here on is finalized onto the row
        // before being returned. If the failure update itself fails, that
        // store error supersedes the build error.
        match self.try_build(&claimed).await {
            Ok(built) => {
                tracing::info!(
                    report_id = %report_id,
                    key = built.output_file_path.as_deref().unwrap_or_default(),
                    "Report build complete"
                );
                Ok(built)
            }
            Err(build_err) => {
                tracing::warn!(
                    report_id = %report_id,
                    error = %build_err,
                    "Report build failed, finalizing failure state"
                );
                match self
                    .db
                    .mark_failed(report_id, user_id, &build_err.to_string())
                    .await
                {
                    Ok(_) => Err(build_err),
                    Err(update_err) => Err(update_err),
                }
            }
        }
    }

    /// Fetch, encode, upload, and mark completion — the fallible middle
    async fn try_build(&self, report: &Report) -> Result<Report> {
        let report_id = ReportId(report.id);
        let user_id = UserId(report.user_id);
        let report_type: ReportType = report.report_type.parse()?;

        let records = self.fetcher.fetch(report_type).await?;
        // The fetcher contract already rejects empty results, but the
        // invariant is cheap to re-check against other implementations
        if records.is_empty() {
            return Err(Error::Fetch(FetchError::NoRecords(report_type.to_string())));
        }

        let bytes = encode_csv_gz(&records)?;
        let key = output_key(user_id, report_id);
        self.blob.put(&key, bytes).await?;

        self.db.mark_completed(report_id, user_id, &key).await
    }
}

/// Encode records as a gzip-compressed CSV blob with the fixed header
fn encode_csv_gz(records: &[CompendiumEntry]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut writer = csv::Writer::from_writer(encoder);

    writer
        .write_record(CSV_HEADER)
        .map_err(|e| Error::Storage(StorageError::CsvWrite(e.to_string())))?;

    for record in records {
        writer
            .write_record([
                record.name.as_str(),
                &record.id.to_string(),
                record.category.as_str(),
                record.description.as_str(),
                record.image.as_str(),
                &record.common_locations.join(", "),
                &record.drops.join(", "),
                if record.dlc { "true" } else { "false" },
            ])
            .map_err(|e| Error::Storage(StorageError::CsvWrite(e.to_string())))?;
    }

    let mut encoder = writer
        .into_inner()
        .map_err(|e| Error::Storage(StorageError::CsvWrite(e.to_string())))?;
    encoder
        .flush()
        .map_err(|e| Error::Storage(StorageError::GzipFinalize(e.to_string())))?;
    encoder
        .finish()
        .map_err(|e| Error::Storage(StorageError::GzipFinalize(e.to_string())))
}
