use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::config::Config;
use crate::jobs::submit_job;
use crate::jobs::types::{JobItem, JobStatus};

/// Client request to submit a job
#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    /// free-form payload forwarded to the worker as the message body
    description: String,
}

#[derive(Debug, Deserialize)]
struct JobId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobsFilter {
    status: Option<JobStatus>,
}

#[derive(Debug, Serialize)]
struct JobApiResponse {
    job_id: String,
    status: String,
    description: String,
    submitted_at: String,
    updated_at: String,
}

impl From<JobItem> for JobApiResponse {
    fn from(job: JobItem) -> Self {
        Self {
            job_id: job.id,
            status: job.status.to_string(),
            description: job.description,
            submitted_at: job.submitted_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

async fn handle_create_job_request(
    State(config): State<Arc<Config>>,
    Json(payload): Json<CreateJobRequest>,
) -> impl IntoResponse {
    match submit_job(payload.description, config).await {
        Ok(job) => ApiResponse::success(JobApiResponse::from(job)).into_response(),
        Err(e) => ApiResponse::<JobApiResponse>::error(e.to_string()).into_response(),
    }
}

async fn handle_get_job_request(
    Path(JobId { id }): Path<JobId>,
    State(config): State<Arc<Config>>,
) -> impl IntoResponse {
    match config.database().get_job_by_id(&id).await {
        Ok(Some(job)) => ApiResponse::success(JobApiResponse::from(job)).into_response(),
        Ok(None) => ApiResponse::<JobApiResponse>::error(format!("no job found with id {}", id)).into_response(),
        Err(e) => ApiResponse::<JobApiResponse>::error(e.to_string()).into_response(),
    }
}

async fn handle_list_jobs_request(
    Query(filter): Query<JobsFilter>,
    State(config): State<Arc<Config>>,
) -> impl IntoResponse {
    let jobs = match filter.status {
        Some(status) => config.database().get_jobs_by_status(status).await,
        None => config.database().get_all_jobs().await,
    };

    match jobs {
        Ok(jobs) => {
            ApiResponse::success(jobs.into_iter().map(JobApiResponse::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => ApiResponse::<Vec<JobApiResponse>>::error(e.to_string()).into_response(),
    }
}

pub fn job_router(config: Arc<Config>) -> Router {
    Router::new().nest("/jobs", jobs_routes(config))
}

fn jobs_routes(config: Arc<Config>) -> Router {
    Router::new()
        .route("/", post(handle_create_job_request).get(handle_list_jobs_request))
        .route("/:id", get(handle_get_job_request))
        .with_state(config)
}
