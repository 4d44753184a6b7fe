pub mod simulated_job;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::config::Config;
use crate::database::DatabaseError;
use crate::jobs::types::JobItem;
use crate::queue::QueueError;

/// The job's own logic failed. The worker, not the job, decides what happens
/// to the status record and the queue message afterwards.
#[derive(Error, Debug, PartialEq)]
pub enum ProcessingError {
    #[error("job logic failed: {0}")]
    Failed(String),
}

/// Submission-side failures surfaced to the gateway routes.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The Job trait is the unit of work run for one message. Implementations
/// get the raw message body and must not touch the status record; every
/// transition is owned by the worker loop.
#[automock]
#[async_trait]
pub trait Job: Send + Sync {
    async fn process_job(&self, body: &str) -> Result<(), ProcessingError>;
}

/// Accepts a job: enqueues the description, then creates the `SUBMITTED`
/// record keyed by the message id the transport handed back. The insert runs
/// after a successful enqueue, so a failed insert leaves an already-queued
/// message with no record. The worker treats that as a recordless anomaly
/// rather than refusing the job.
pub async fn submit_job(description: String, config: Arc<Config>) -> Result<JobItem, JobError> {
    let message_id = config.queue().send_message(description.clone()).await?;
    tracing::info!(job_id = %message_id, "Job enqueued");

    let job = config.database().create_job(JobItem::new(message_id, description)).await?;
    tracing::info!(job_id = %job.id, "Job record created");
    Ok(job)
}
