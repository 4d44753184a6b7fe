use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use rstest::fixture;
use uuid::Uuid;

use crate::config::Config;
use crate::database::MockDatabase;
use crate::jobs::types::{JobItem, JobStatus};
use crate::jobs::MockJob;
use crate::queue::{MockQueueProvider, QueueMessage};
use crate::worker::WorkerSettings;

/// Settings small enough that loop tests finish quickly.
pub fn test_worker_settings() -> WorkerSettings {
    WorkerSettings {
        poll_wait: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        max_delivery_attempts: 3,
        processing_visibility: Duration::from_secs(60),
    }
}

pub fn test_config(queue: MockQueueProvider, database: MockDatabase, processor: MockJob) -> Arc<Config> {
    test_config_with_settings(queue, database, processor, test_worker_settings())
}

pub fn test_config_with_settings(
    queue: MockQueueProvider,
    database: MockDatabase,
    processor: MockJob,
    worker_settings: WorkerSettings,
) -> Arc<Config> {
    Arc::new(Config::new(Box::new(queue), Box::new(database), Box::new(processor), worker_settings))
}

#[fixture]
pub fn default_job_item() -> JobItem {
    JobItem {
        id: String::from("abc-123"),
        description: String::from("build-report"),
        status: JobStatus::Submitted,
        submitted_at: Utc::now().round_subsecs(0),
        updated_at: Utc::now().round_subsecs(0),
    }
}

#[fixture]
pub fn default_queue_message() -> QueueMessage {
    QueueMessage {
        id: String::from("abc-123"),
        body: String::from("build-report"),
        receipt_handle: Uuid::new_v4().to_string(),
        receive_count: 1,
    }
}
