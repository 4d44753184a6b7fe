use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;

use crate::queue::{QueueError, QueueMessage, QueueProvider};
use crate::utils::env_utils::get_env_var_or_panic;

/// SQS caps long-poll waits at 20 seconds per receive call.
const MAX_WAIT_TIME_SECONDS: u64 = 20;

pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    /// Builds the queue client from the ambient AWS configuration and the
    /// queue URL in `SQS_JOB_QUEUE_URL`.
    pub async fn new_from_env() -> Self {
        let aws_config = aws_config::load_from_env().await;
        let client = Client::new(&aws_config);
        let queue_url = get_env_var_or_panic("SQS_JOB_QUEUE_URL");
        Self::new(client, queue_url)
    }
}

#[async_trait]
impl QueueProvider for SqsQueue {
    async fn send_message(&self, payload: String) -> Result<String, QueueError> {
        let response = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(payload)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        response.message_id.ok_or(QueueError::MalformedMessage("message id"))
    }

    async fn receive_message(&self, max_wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            // batch size 1 keeps processing single-flight per instance
            .max_number_of_messages(1)
            .wait_time_seconds(max_wait.as_secs().min(MAX_WAIT_TIME_SECONDS) as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let message = match response.messages.unwrap_or_default().into_iter().next() {
            Some(message) => message,
            None => return Ok(None),
        };

        let receive_count = message
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse::<u32>().ok())
            .unwrap_or(1);

        Ok(Some(QueueMessage {
            id: message.message_id.ok_or(QueueError::MalformedMessage("message id"))?,
            body: message.body.ok_or(QueueError::MalformedMessage("body"))?,
            receipt_handle: message.receipt_handle.ok_or(QueueError::MalformedMessage("receipt handle"))?,
            receive_count,
        }))
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn extend_visibility(&self, receipt_handle: &str, timeout: Duration) -> Result<(), QueueError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(timeout.as_secs() as i32)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(())
    }
}
