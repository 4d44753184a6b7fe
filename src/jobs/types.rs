use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// An acknowledgement that the job has been accepted by the gateway
    /// and is waiting on the queue
    Submitted,
    /// A worker has checked the message out and started processing
    InProgress,
    /// The job finished successfully. No other action needs to be taken
    Complete,
    /// The job was given up on, either because its own logic failed or
    /// because its delivery attempts ran out
    Failed,
}

impl JobStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Whether a record currently at `self` may be rewritten to `next`.
    ///
    /// Re-writing the same status is always permitted so that duplicate
    /// deliveries stay harmless. Everything else only moves forward:
    /// `Submitted -> InProgress -> Complete | Failed`. A job whose
    /// processing never got recorded can also go `Submitted -> Failed`
    /// once its delivery attempts are exhausted.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (JobStatus::Submitted, JobStatus::InProgress)
                | (JobStatus::Submitted, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Complete)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }

    /// All statuses from which a record is allowed to reach `self`,
    /// including `self`. Used by the store to guard status writes with a
    /// single filtered update.
    pub fn permitted_predecessors(&self) -> Vec<JobStatus> {
        [JobStatus::Submitted, JobStatus::InProgress, JobStatus::Complete, JobStatus::Failed]
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobItem {
    /// the message id assigned by the queue transport at enqueue time,
    /// reused as the job's primary key
    pub id: String,
    /// free-form payload supplied at submission, carried as the message body
    pub description: String,
    /// the status of the job
    pub status: JobStatus,
    /// when the gateway accepted the job
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub submitted_at: DateTime<Utc>,
    /// rewritten on every status write, including idempotent re-writes
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl JobItem {
    /// A fresh record as the gateway creates it.
    pub fn new(id: String, description: String) -> Self {
        let now = Utc::now();
        Self { id, description, status: JobStatus::Submitted, submitted_at: now, updated_at: now }
    }
}
