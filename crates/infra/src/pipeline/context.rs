//! Shared plumbing for collaborator stages: guarded loads, owned writes and
//! failure reporting.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use titledoc_core::{DomainError, JobId, JobPatch, JobRecord, JobStatus, Stage};
use titledoc_events::{Emitter, StageFailed, Topic};

use super::collaborators::CollaboratorError;
use crate::store::{JOBS, JobStore, StoreError};

/// Why a stage could not complete. Every variant ends up as the stage's
/// failure event; none is surfaced to the router.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("no videos found for channel {0}")]
    NoVideos(String),
}

/// Store and emitter handed to every stage.
#[derive(Clone)]
pub struct StepContext {
    store: Arc<dyn JobStore>,
    emitter: Emitter,
}

impl StepContext {
    pub fn new<S>(store: S, emitter: Emitter) -> Self
    where
        S: JobStore + 'static,
    {
        Self {
            store: Arc::new(store),
            emitter,
        }
    }

    pub fn from_arc(store: Arc<dyn JobStore>, emitter: Emitter) -> Self {
        Self { store, emitter }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Load a job if its status is one of `accepted`.
    ///
    /// Unknown jobs and jobs in any other status (already advanced, failed,
    /// completed) yield `None`: the event is a redelivery or arrived too late,
    /// and the stage must not touch the record.
    pub async fn claim(
        &self,
        stage: Stage,
        job_id: &JobId,
        accepted: &[JobStatus],
    ) -> Result<Option<JobRecord>, StoreError> {
        match self.store.get(JOBS, job_id).await? {
            None => {
                warn!(%stage, %job_id, "job not found; skipping");
                Ok(None)
            }
            Some(record) if accepted.contains(&record.status) => Ok(Some(record)),
            Some(record) => {
                info!(%stage, %job_id, status = %record.status, "job not in expected status; skipping");
                Ok(None)
            }
        }
    }

    /// Apply `patch` on behalf of `stage` and persist the result.
    ///
    /// The patch is merged onto a fresh read, not onto `record`: a stage
    /// holds its copy across a collaborator call, and the aggregator may have
    /// failed the job meanwhile. If the stored status no longer matches
    /// `record.status` the write is dropped and `Ok(false)` returned; the
    /// caller must stop without emitting.
    ///
    /// `record` is only updated once the store accepted the write.
    pub async fn write(
        &self,
        stage: Stage,
        record: &mut JobRecord,
        patch: JobPatch,
    ) -> Result<bool, StepError> {
        let job_id = &record.job_id;
        let Some(mut next) = self.store.get(JOBS, job_id).await? else {
            warn!(%stage, %job_id, "job vanished before write; dropping");
            return Ok(false);
        };
        if next.status != record.status {
            info!(%stage, %job_id, claimed = %record.status, found = %next.status, "job moved on while stage ran; dropping write");
            return Ok(false);
        }

        next.apply_patch(stage, &patch, Utc::now())?;
        self.store.set(JOBS, &next.job_id, &next).await?;

        debug!(%stage, job_id = %next.job_id, from = %record.status, to = %next.status, "job record updated");
        *record = next;
        Ok(true)
    }

    /// Emit the stage's normalized failure event.
    ///
    /// The stage never marks the job failed itself; the aggregator does.
    pub fn report_failure(&self, stage: Stage, job_id: &JobId, email: &str, message: &str) {
        let Some(topic) = Topic::failure_of(stage) else {
            error!(%stage, %job_id, "stage has no failure topic");
            return;
        };
        if email.trim().is_empty() {
            error!(%stage, %job_id, "cannot report failure: missing email");
            return;
        }

        let payload = StageFailed {
            job_id: job_id.clone(),
            email: Some(email.to_string()),
            error: message.to_string(),
        };
        if let Err(err) = self.emitter.emit(topic, payload) {
            error!(%stage, %job_id, %topic, error = %err, "failed to emit stage failure");
        }
    }
}

impl core::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepContext").finish_non_exhaustive()
    }
}
