//! Work queue access.
//!
//! The [`ReportQueue`] trait models an at-least-once message queue: a
//! received entry stays in the queue until explicitly deleted, and an
//! undeleted entry is redelivered once its visibility timeout elapses.
//! [`SqsQueue`] is the SQS-backed implementation; the queue URL is resolved
//! from the configured queue name once, at connect time.

use async_trait::async_trait;

use crate::config::AwsConfig;
use crate::error::{Error, QueueError, Result};

/// One received queue entry
///
/// The body is the opaque serialized payload; the receipt handle is used
/// only for deletion. Both are optional to mirror what the transport can
/// actually return — consumers must tolerate their absence.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Opaque message body
    pub body: Option<String>,
    /// Handle for acknowledging (deleting) this delivery
    pub receipt_handle: Option<String>,
}

/// Abstract receive/delete/send operations against a message queue
#[async_trait]
pub trait ReportQueue: Send + Sync {
    /// Long-poll for up to `max_messages` entries, waiting up to
    /// `wait_time_secs` for the first one
    async fn receive(&self, max_messages: i32, wait_time_secs: i32) -> Result<Vec<QueueEntry>>;

    /// Delete (acknowledge) a delivery by its receipt handle
    async fn delete(&self, receipt_handle: &str) -> Result<()>;

    /// Enqueue a message body
    async fn send(&self, body: &str) -> Result<()>;
}

/// SQS-backed work queue
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Connect to the named queue, resolving its URL once
    ///
    /// Honors the `sqs_endpoint` override so the queue works against
    /// localstack in development.
    pub async fn connect(aws: &AwsConfig, queue_name: &str) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &aws.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&shared);
        if let Some(endpoint) = &aws.sqs_endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let client = aws_sdk_sqs::Client::from_conf(builder.build());

        let queue_url = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|e| {
                Error::Queue(QueueError::ResolveUrl {
                    queue: queue_name.to_string(),
                    message: e.into_service_error().to_string(),
                })
            })?
            .queue_url()
            .ok_or_else(|| {
                Error::Queue(QueueError::ResolveUrl {
                    queue: queue_name.to_string(),
                    message: "response carried no queue URL".to_string(),
                })
            })?
            .to_string();

        tracing::info!(queue = %queue_name, url = %queue_url, "Resolved queue URL");

        Ok(Self { client, queue_url })
    }
}

#[async_trait]
impl ReportQueue for SqsQueue {
    async fn receive(&self, max_messages: i32, wait_time_secs: i32) -> Result<Vec<QueueEntry>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_secs)
            .send()
            .await
            .map_err(|e| Error::Queue(QueueError::Receive(e.into_service_error().to_string())))?;

        let entries = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| QueueEntry {
                body: m.body,
                receipt_handle: m.receipt_handle,
            })
            .collect();

        Ok(entries)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| Error::Queue(QueueError::Delete(e.into_service_error().to_string())))?;

        Ok(())
    }

    async fn send(&self, body: &str) -> Result<()> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| Error::Queue(QueueError::Send(e.into_service_error().to_string())))?;

        Ok(())
    }
}
