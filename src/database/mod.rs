pub mod mongodb;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::jobs::types::{JobItem, JobStatus};

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// No record exists for the given job id. A usage error: the gateway
    /// must create the record before the message reaches a worker.
    #[error("no job record found for id {id}")]
    NotFound { id: String },

    /// The requested status write would move the record backward. Carries
    /// the status the record is currently at so callers can tell a
    /// duplicate delivery of a finished job from a genuine bug.
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition { id: String, from: JobStatus, to: JobStatus },

    /// The store could not be reached. The affected job is simply not
    /// updated; its message stays on the queue for redelivery.
    #[error("job store unavailable: {0}")]
    Unavailable(#[from] ::mongodb::error::Error),

    #[error("failed to serialize job data: {0}")]
    Serialization(#[from] ::mongodb::bson::ser::Error),
}

/// The Database trait defines the persistence operations for job records.
/// One long-lived connection per worker instance is enough; processing is
/// one job at a time, so there is no need for pooling discipline here.
#[automock]
#[async_trait]
pub trait Database: Send + Sync {
    /// Idempotently ensures the job-record schema exists. Safe to call on
    /// every startup.
    async fn setup(&self) -> Result<(), DatabaseError>;

    /// Inserts the initial record. Only the gateway calls this.
    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError>;

    async fn get_job_by_id(&self, id: &str) -> Result<Option<JobItem>, DatabaseError>;

    async fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<JobItem>, DatabaseError>;

    async fn get_all_jobs(&self) -> Result<Vec<JobItem>, DatabaseError>;

    /// Writes `status` and refreshes `updated_at`. The write only lands when
    /// the record's current status is a permitted predecessor of `status`
    /// (same-status re-writes included, so duplicate deliveries stay
    /// harmless). Fails with `NotFound` when no record exists and with
    /// `InvalidTransition` when the write would move the status backward.
    async fn set_job_status(&self, id: &str, status: JobStatus) -> Result<(), DatabaseError>;
}
