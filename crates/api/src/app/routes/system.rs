use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};

use titledoc_events::DispatchStats;

use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> Json<DispatchStats> {
    Json(services.dispatch_stats())
}
