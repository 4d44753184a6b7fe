use std::sync::Arc;

use crate::database::mongodb::config::MongoDbConfig;
use crate::database::mongodb::MongoDb;
use crate::database::Database;
use crate::jobs::simulated_job::SimulatedJob;
use crate::jobs::Job;
use crate::queue::sqs::SqsQueue;
use crate::queue::QueueProvider;
use crate::worker::WorkerSettings;

/// Resolved collaborators for one process instance. Built once at startup;
/// everything downstream receives an `Arc<Config>` explicitly.
pub struct Config {
    queue: Box<dyn QueueProvider>,
    database: Box<dyn Database>,
    processor: Box<dyn Job>,
    worker_settings: WorkerSettings,
}

impl Config {
    pub fn new(
        queue: Box<dyn QueueProvider>,
        database: Box<dyn Database>,
        processor: Box<dyn Job>,
        worker_settings: WorkerSettings,
    ) -> Self {
        Self { queue, database, processor, worker_settings }
    }

    pub fn queue(&self) -> &dyn QueueProvider {
        self.queue.as_ref()
    }

    pub fn database(&self) -> &dyn Database {
        self.database.as_ref()
    }

    pub fn processor(&self) -> &dyn Job {
        self.processor.as_ref()
    }

    pub fn worker_settings(&self) -> &WorkerSettings {
        &self.worker_settings
    }
}

/// Builds the process configuration from the environment. A missing queue
/// URL or an unreachable store is fatal here, before the worker loop or the
/// server ever starts.
pub async fn init_config() -> color_eyre::Result<Arc<Config>> {
    let queue = Box::new(SqsQueue::new_from_env().await);

    let database = Box::new(MongoDb::new(MongoDbConfig::new_from_env()).await?);
    database.setup().await?;

    let processor = Box::new(SimulatedJob::new_from_env());

    Ok(Arc::new(Config::new(queue, database, processor, WorkerSettings::new_from_env())))
}
