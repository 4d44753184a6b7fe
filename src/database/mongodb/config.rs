use crate::utils::env_utils::{get_env_var_or_default, get_env_var_or_panic};

pub struct MongoDbConfig {
    /// full connection string, including credentials
    pub url: String,
    /// database holding the job records
    pub database: String,
}

impl MongoDbConfig {
    pub fn new_from_env() -> Self {
        Self {
            url: get_env_var_or_panic("MONGODB_CONNECTION_STRING"),
            database: get_env_var_or_default("MONGODB_DATABASE_NAME", "job_pipeline"),
        }
    }
}
