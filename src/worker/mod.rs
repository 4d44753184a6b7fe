use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::database::DatabaseError;
use crate::jobs::types::JobStatus;
use crate::jobs::ProcessingError;
use crate::queue::{QueueError, QueueMessage};
use crate::utils::env_utils::{get_env_var_or_default, get_env_var_secs_or_default};

#[derive(Error, Debug)]
pub enum ConsumptionError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("job {id} failed processing on delivery {attempt}: {source}")]
    ProcessingFailed { id: String, attempt: u32, source: ProcessingError },
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// long-poll wait per receive call
    pub poll_wait: Duration,
    /// fixed delay after a transient poll error
    pub error_backoff: Duration,
    /// deliveries after which a message is marked failed instead of retried
    pub max_delivery_attempts: u32,
    /// visibility window requested for the span of one processing run
    pub processing_visibility: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_wait: Duration::from_secs(20),
            error_backoff: Duration::from_secs(10),
            max_delivery_attempts: 5,
            processing_visibility: Duration::from_secs(60),
        }
    }
}

impl WorkerSettings {
    pub fn new_from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_wait: get_env_var_secs_or_default("WORKER_POLL_WAIT_SECS", defaults.poll_wait.as_secs()),
            error_backoff: get_env_var_secs_or_default("WORKER_ERROR_BACKOFF_SECS", defaults.error_backoff.as_secs()),
            max_delivery_attempts: get_env_var_or_default(
                "WORKER_MAX_DELIVERY_ATTEMPTS",
                &defaults.max_delivery_attempts.to_string(),
            )
            .parse()
            .expect("WORKER_MAX_DELIVERY_ATTEMPTS must be a u32"),
            processing_visibility: get_env_var_secs_or_default(
                "WORKER_PROCESSING_VISIBILITY_SECS",
                defaults.processing_visibility.as_secs(),
            ),
        }
    }
}

/// The consumer half of the pipeline. One worker processes one message at a
/// time; scaling out means running more instances, coordinated only through
/// the queue's visibility windows.
pub struct Worker {
    config: Arc<Config>,
    cancellation_token: CancellationToken,
}

impl Worker {
    pub fn new(config: Arc<Config>, cancellation_token: CancellationToken) -> Self {
        Self { config, cancellation_token }
    }

    /// Check if shutdown has been requested (non-blocking). Inspected at
    /// exactly two points per iteration: before issuing a poll, and after a
    /// receive but before dispatch. An in-flight job is never interrupted.
    pub fn is_shutdown_requested(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Polls, dispatches and acknowledges until shutdown is requested.
    /// Every error is contained within its own iteration; only the
    /// cancellation token ends the loop.
    pub async fn run(&self) {
        let settings = self.config.worker_settings().clone();
        info!("Worker started, polling queue");

        loop {
            if self.is_shutdown_requested() {
                info!("Shutdown requested, stopping before next poll");
                break;
            }

            let message = match self.config.queue().receive_message(settings.poll_wait).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("No messages in queue, polling again");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Failed to poll queue, backing off");
                    sleep(settings.error_backoff).await;
                    continue;
                }
            };

            // A stop request observed between receive and dispatch abandons
            // the delivery untouched: no status write, no acknowledgement.
            // The visibility window hands the message to another instance.
            if self.is_shutdown_requested() {
                info!(job_id = %message.id, "Shutdown requested, leaving received message for redelivery");
                break;
            }

            if let Err(e) = self.handle_message(&message).await {
                error!(job_id = %message.id, error = %e, "Failed to handle job, message left for redelivery");
            }
        }

        info!("Worker stopped");
    }

    /// Runs the state machine for one delivery. Returning an error means the
    /// message was not acknowledged and the visibility window will redeliver
    /// it; that lapse is the only retry mechanism.
    pub(crate) async fn handle_message(&self, message: &QueueMessage) -> Result<(), ConsumptionError> {
        let settings = self.config.worker_settings();

        if message.receive_count > settings.max_delivery_attempts {
            return self.give_up_on_message(message).await;
        }

        // Commit to processing: the IN_PROGRESS write must land before the
        // job runs so a crash mid-processing is visible in the record.
        let recorded = match self.config.database().set_job_status(&message.id, JobStatus::InProgress).await {
            Ok(()) => true,
            Err(DatabaseError::NotFound { .. }) => {
                // enqueued without a record: the gateway insert failed.
                // The job still runs; there is just nowhere to record it.
                error!(job_id = %message.id, "Message has no job record, processing without status tracking");
                false
            }
            Err(DatabaseError::InvalidTransition { from, .. }) if from.is_terminal() => {
                // a previous delivery finished this job but its
                // acknowledgement was lost
                info!(job_id = %message.id, status = %from, "Duplicate delivery of a finished job, acknowledging");
                self.config.queue().delete_message(&message.receipt_handle).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) =
            self.config.queue().extend_visibility(&message.receipt_handle, settings.processing_visibility).await
        {
            // worst case is an early redelivery, which processing already
            // tolerates
            warn!(job_id = %message.id, error = %e, "Failed to extend message visibility");
        }

        match self.config.processor().process_job(&message.body).await {
            Ok(()) => {
                // terminal status first, acknowledgement second: a crash in
                // between leaves the record settled and the message queued,
                // never the other way around
                if recorded {
                    self.config.database().set_job_status(&message.id, JobStatus::Complete).await?;
                }
                self.config.queue().delete_message(&message.receipt_handle).await?;
                info!(job_id = %message.id, "Job complete");
                Ok(())
            }
            Err(e) => Err(ConsumptionError::ProcessingFailed {
                id: message.id.clone(),
                attempt: message.receive_count,
                source: e,
            }),
        }
    }

    /// A message past its delivery budget is settled as FAILED and removed
    /// from the queue instead of being retried forever.
    async fn give_up_on_message(&self, message: &QueueMessage) -> Result<(), ConsumptionError> {
        warn!(job_id = %message.id, deliveries = message.receive_count, "Delivery attempts exhausted, marking job failed");

        match self.config.database().set_job_status(&message.id, JobStatus::Failed).await {
            Ok(()) => {}
            Err(DatabaseError::NotFound { .. }) => {
                warn!(job_id = %message.id, "No job record to mark failed");
            }
            Err(DatabaseError::InvalidTransition { from, .. }) if from.is_terminal() => {
                info!(job_id = %message.id, status = %from, "Job already settled, acknowledging");
            }
            // store unreachable: leave the message so a later delivery can
            // still record the failure
            Err(e) => return Err(e.into()),
        }

        self.config.queue().delete_message(&message.receipt_handle).await?;
        Ok(())
    }
}
