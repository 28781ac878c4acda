//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (job store, bus, router, stages)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use titledoc_infra::Collaborators;

use crate::config::ApiConfig;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router with the in-process dev collaborators.
pub async fn build_app(config: ApiConfig) -> anyhow::Result<Router> {
    build_app_with(config, Collaborators::in_memory()).await
}

/// Build the full HTTP router around the given collaborators.
pub async fn build_app_with(config: ApiConfig, collaborators: Collaborators) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(&config, collaborators).await?);

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router().layer(Extension(services)))
        .layer(ServiceBuilder::new()))
}
