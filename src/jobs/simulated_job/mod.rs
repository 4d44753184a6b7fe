use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::jobs::{Job, ProcessingError};
use crate::utils::env_utils::get_env_var_secs_or_default;

/// Stands in for the real unit of work: burns a fixed amount of wall-clock
/// time and succeeds. Useful for exercising the pipeline end to end without
/// external effects.
pub struct SimulatedJob {
    duration: Duration,
}

impl SimulatedJob {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn new_from_env() -> Self {
        Self::new(get_env_var_secs_or_default("SIMULATED_JOB_DURATION_SECS", 10))
    }
}

#[async_trait]
impl Job for SimulatedJob {
    async fn process_job(&self, body: &str) -> Result<(), ProcessingError> {
        tracing::info!(payload = %body, "Processing job for {:?}", self.duration);
        sleep(self.duration).await;
        Ok(())
    }
}
