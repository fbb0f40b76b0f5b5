//! Blob storage for generated report files.
//!
//! The [`BlobStore`] trait is the seam the builder and the link cache use;
//! [`S3BlobStore`] is the S3-backed implementation. Report blobs live under
//! `users/{user_id}/reports/{report_id}.csv.gz` and downloads go through
//! time-limited presigned GET URLs, never direct bucket access.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_smithy_types::byte_stream::ByteStream;

use crate::config::AwsConfig;
use crate::error::{Error, Result, StorageError};

/// Abstract put/presign operations against an object store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a blob under the given key
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Mint a presigned GET URL valid for `ttl`
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// S3-backed blob store
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a store from the AWS configuration and target bucket
    ///
    /// Honors the `s3_endpoint` override (with path-style addressing) so
    /// the store works against localstack in development.
    pub async fn new(aws: &AwsConfig, bucket: &str) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &aws.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &aws.s3_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/gzip")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                Error::Storage(StorageError::PutObject {
                    key: key.to_string(),
                    message: e.into_service_error().to_string(),
                })
            })?;

        tracing::debug!(%key, bucket = %self.bucket, "Uploaded report blob");
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(ttl)
            .build()
            .map_err(|e| {
                Error::Storage(StorageError::Presign {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| {
                Error::Storage(StorageError::Presign {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            })?;

        Ok(presigned.uri().to_string())
    }
}
