//! Upstream compendium source fetching.
//!
//! The [`SourceFetcher`] trait is the seam the report builder depends on;
//! [`CompendiumClient`] is the HTTP-backed implementation. The contract is
//! strict: a non-success upstream status fails, and so does an empty result
//! set — a report built from zero records is never valid.

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::{CompendiumEntry, ReportType};

/// Abstract data source returning the records for a report type
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch all records for the given report type
    ///
    /// # Errors
    ///
    /// Fails on upstream errors and on empty result sets.
    async fn fetch(&self, report_type: ReportType) -> Result<Vec<CompendiumEntry>>;
}

/// JSON body of a compendium category response
#[derive(Debug, serde::Deserialize)]
struct CategoryResponse {
    #[serde(default)]
    data: Vec<CompendiumEntry>,
}

/// HTTP client for the Hyrule compendium API
pub struct CompendiumClient {
    http: reqwest::Client,
    base_url: String,
}

impl CompendiumClient {
    /// Create a client from the source configuration
    pub fn new(config: &SourceConfig) -> Result<Self> {
        // Validate the base URL up front so fetches fail fast on config errors
        url::Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid source base URL: {}", e),
            key: Some("source.base_url".to_string()),
        })?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SourceFetcher for CompendiumClient {
    async fn fetch(&self, report_type: ReportType) -> Result<Vec<CompendiumEntry>> {
        let url = format!("{}/category/{}", self.base_url, report_type);
        tracing::debug!(category = %report_type, %url, "Fetching compendium category");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(FetchError::RequestFailed(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(FetchError::UpstreamStatus {
                status: status.as_u16(),
                category: report_type.to_string(),
            }));
        }

        let body: CategoryResponse = response
            .json()
            .await
            .map_err(|e| Error::Fetch(FetchError::DecodeFailed(e.to_string())))?;

        if body.data.is_empty() {
            return Err(Error::Fetch(FetchError::NoRecords(report_type.to_string())));
        }

        tracing::debug!(
            category = %report_type,
            count = body.data.len(),
            "Fetched compendium records"
        );

        Ok(body.data)
    }
}
