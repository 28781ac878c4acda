use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use titledoc_core::JobId;
use titledoc_infra::ACCEPTED_MESSAGE;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SubmitRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    let accepted = match services
        .submissions()
        .submit(body.channel.as_deref(), body.email.as_deref())
        .await
    {
        Ok(accepted) => accepted,
        Err(e) => return errors::submission_error_to_response(e),
    };

    info!(job_id = %accepted.job_id, emitted = accepted.emitted, "submission accepted");
    (
        StatusCode::ACCEPTED,
        Json(dto::SubmitResponse {
            success: true,
            job_id: accepted.job_id,
            message: ACCEPTED_MESSAGE,
        }),
    )
        .into_response()
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let Ok(job_id) = JobId::parse(job_id) else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_job_id", "job id must not be blank");
    };

    match services.job(&job_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("job {job_id} not found")),
        Err(e) => errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string()),
    }
}
