use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use titledoc_infra::SubmissionError;

pub fn submission_error_to_response(err: SubmissionError) -> axum::response::Response {
    match err {
        SubmissionError::MissingFields => {
            json_error(StatusCode::BAD_REQUEST, "missing_fields", err.to_string())
        }
        SubmissionError::InvalidEmail => {
            json_error(StatusCode::BAD_REQUEST, "invalid_email", err.to_string())
        }
        SubmissionError::Store(e) => {
            tracing::error!(error = %e, "failed to persist submission");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
