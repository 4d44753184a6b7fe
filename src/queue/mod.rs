pub mod sqs;

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The transport could not be reached or rejected the call. Always
    /// retryable; the worker backs off and polls again.
    #[error("queue transport error: {0}")]
    Transport(String),

    /// The transport returned a message missing a required field.
    #[error("queue returned a message without a {0}")]
    MalformedMessage(&'static str),
}

/// One delivery of a queue message. The receipt handle is only valid for
/// this delivery attempt; a redelivery of the same message carries a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// transport-assigned message id, reused as the job id
    pub id: String,
    /// the serialized job description
    pub body: String,
    /// token for acknowledging or extending this specific delivery
    pub receipt_handle: String,
    /// how many times the transport has handed this message out, this
    /// delivery included
    pub receive_count: u32,
}

/// The QueueProvider trait defines the operations the pipeline needs from a
/// durable at-least-once message queue. Anything that can enqueue a payload,
/// long-poll for a single message and acknowledge a delivery can back the
/// pipeline.
#[automock]
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Enqueues a payload and returns the transport-assigned message id.
    async fn send_message(&self, payload: String) -> Result<String, QueueError>;

    /// Long-polls for at most one message, waiting up to `max_wait`.
    /// `Ok(None)` means the queue was empty for the whole wait, which is the
    /// normal idle outcome and not an error.
    async fn receive_message(&self, max_wait: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Durably removes a delivered message so it is not redelivered. Must
    /// only be called once the corresponding job has reached a terminal
    /// status; an unacknowledged message reappears after its visibility
    /// window lapses, which is the pipeline's retry mechanism.
    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Stretches the visibility window of an in-flight delivery so it covers
    /// the expected processing time.
    async fn extend_visibility(&self, receipt_handle: &str, timeout: Duration) -> Result<(), QueueError>;
}
