//! Message queue collaborator for normalized records.

use crate::error::QueuePublishError;
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use tracing::debug;

#[async_trait]
pub trait QueueSink: Send + Sync {
    /// Publish one message body to `destination` (a queue URL for SQS).
    async fn send(&self, destination: &str, body: String) -> Result<(), QueuePublishError>;
}

/// SQS-backed queue sink
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueSink for SqsQueue {
    async fn send(&self, destination: &str, body: String) -> Result<(), QueuePublishError> {
        let output = self
            .client
            .send_message()
            .queue_url(destination)
            .message_body(body)
            .send()
            .await
            .map_err(|err| QueuePublishError::Send {
                destination: destination.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        debug!(message_id = ?output.message_id(), "Queued record");
        Ok(())
    }
}
