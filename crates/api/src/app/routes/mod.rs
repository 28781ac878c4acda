use axum::{
    Router,
    routing::{get, post},
};

pub mod jobs;
pub mod system;

/// Router for every pipeline endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/submit", post(jobs::submit))
        .route("/jobs/:job_id", get(jobs::get_job))
        .route("/stats", get(system::stats))
}
