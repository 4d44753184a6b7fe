pub mod config;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection, IndexModel};

use crate::database::mongodb::config::MongoDbConfig;
use crate::database::{Database, DatabaseError};
use crate::jobs::types::{JobItem, JobStatus};

pub struct MongoDb {
    client: Client,
    database: String,
}

impl MongoDb {
    /// Connects and pings the deployment so a bad connection string fails at
    /// startup rather than on the first job.
    pub async fn new(config: MongoDbConfig) -> Result<Self, DatabaseError> {
        let mut client_options = ClientOptions::parse(config.url).await?;
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);
        let client = Client::with_options(client_options)?;
        client.database("admin").run_command(doc! {"ping": 1}, None).await?;
        tracing::debug!("Connected to MongoDB deployment");

        Ok(MongoDb { client, database: config.database })
    }

    fn get_job_collection(&self) -> Collection<JobItem> {
        self.client.database(&self.database).collection("jobs")
    }

    async fn find_jobs(&self, filter: Document) -> Result<Vec<JobItem>, DatabaseError> {
        let cursor = self.get_job_collection().find(filter, None).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl Database for MongoDb {
    async fn setup(&self) -> Result<(), DatabaseError> {
        // create-if-absent: re-creating an identical index is a no-op
        let index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.get_job_collection().create_index(index, None).await?;
        Ok(())
    }

    async fn create_job(&self, job: JobItem) -> Result<JobItem, DatabaseError> {
        self.get_job_collection().insert_one(&job, None).await?;
        Ok(job)
    }

    async fn get_job_by_id(&self, id: &str) -> Result<Option<JobItem>, DatabaseError> {
        let filter = doc! {
            "id": id
        };
        Ok(self.get_job_collection().find_one(filter, None).await?)
    }

    async fn get_jobs_by_status(&self, status: JobStatus) -> Result<Vec<JobItem>, DatabaseError> {
        let filter = doc! {
            "status": to_bson(&status)?
        };
        self.find_jobs(filter).await
    }

    async fn get_all_jobs(&self) -> Result<Vec<JobItem>, DatabaseError> {
        self.find_jobs(doc! {}).await
    }

    /// The transition guard lives in the filter: the update only matches a
    /// record whose current status may move to `status`. This keeps the
    /// write a single statement, so two workers racing on the same job
    /// cannot interleave a read-check-write and move the record backward.
    async fn set_job_status(&self, id: &str, status: JobStatus) -> Result<(), DatabaseError> {
        let permitted = status
            .permitted_predecessors()
            .iter()
            .map(to_bson)
            .collect::<Result<Vec<Bson>, _>>()?;
        let filter = doc! {
            "id": id,
            "status": { "$in": permitted },
        };
        let update = doc! {
            "$set": {
                "status": to_bson(&status)?,
                "updated_at": Bson::DateTime(mongodb::bson::DateTime::from_chrono(Utc::now())),
            }
        };

        let result = self.get_job_collection().update_one(filter, update, None).await?;
        if result.matched_count == 0 {
            // either the record is missing or it is already past `status`
            return match self.get_job_by_id(id).await? {
                None => Err(DatabaseError::NotFound { id: id.to_string() }),
                Some(job) => Err(DatabaseError::InvalidTransition { id: id.to_string(), from: job.status, to: status }),
            };
        }
        Ok(())
    }
}
