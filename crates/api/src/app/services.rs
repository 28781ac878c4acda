//! Infrastructure wiring: job store, event bus, router, stages and sweep.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use titledoc_core::{JobId, JobRecord};
use titledoc_events::{DispatchStats, Emitter, Event, EventRouter, InMemoryEventBus, RouterHandle};
use titledoc_infra::{
    Collaborators, InMemoryJobStore, JOBS, JobStore, PostgresJobStore, StallSweep, StepContext,
    StoreError, SubmissionService, SweepHandle, install,
};

use crate::config::ApiConfig;

/// Long-lived services shared by every request handler.
pub struct AppServices {
    store: Arc<dyn JobStore>,
    submissions: SubmissionService,
    router: RouterHandle,
    _sweep: Option<SweepHandle>,
}

impl AppServices {
    pub fn submissions(&self) -> &SubmissionService {
        &self.submissions
    }

    pub async fn job(&self, job_id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        self.store.get(JOBS, job_id).await
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.router.stats()
    }
}

async fn build_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    if !config.use_persistent_stores {
        return Ok(Arc::new(InMemoryJobStore::new()));
    }

    let Some(url) = config.database_url.as_deref() else {
        warn!("USE_PERSISTENT_STORES=true but DATABASE_URL is not set, falling back to in-memory");
        return Ok(Arc::new(InMemoryJobStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    let store = PostgresJobStore::new(pool);
    store
        .ensure_schema()
        .await
        .context("failed to create job_records table")?;

    info!("using postgres job store");
    Ok(Arc::new(store))
}

pub async fn build_services(
    config: &ApiConfig,
    collaborators: Collaborators,
) -> anyhow::Result<AppServices> {
    let store = build_store(config).await?;
    let bus: Arc<InMemoryEventBus<Event>> = Arc::new(InMemoryEventBus::new());
    let ctx = StepContext::from_arc(store.clone(), Emitter::new(bus.clone()));

    let router = Arc::new(install(EventRouter::builder(bus), &ctx, &collaborators).build());
    let router = router.spawn();

    let sweep = config.stall_timeout.map(|timeout| {
        StallSweep::new(ctx.clone(), timeout).spawn(config.stall_sweep_interval)
    });

    Ok(AppServices {
        store,
        submissions: SubmissionService::new(ctx),
        router,
        _sweep: sweep,
    })
}
