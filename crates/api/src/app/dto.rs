use serde::{Deserialize, Serialize};

use titledoc_core::JobId;

// -------------------------
// Request DTOs
// -------------------------

/// Both fields are optional at the JSON level so that a missing field is
/// reported with the submission error rather than a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub channel: Option<String>,
    pub email: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub job_id: JobId,
    pub message: &'static str,
}
