//! Centralized failure handling.
//!
//! The aggregator is the only writer allowed to move a job to `failed`. It
//! consumes every stage failure topic plus `yt.job.stalled`, writes
//! `status=failed`, `error` and `failedAt`, then emits one normalized
//! `yt.error.handled` event.
//!
//! | record status   | effect                                      |
//! |-----------------|---------------------------------------------|
//! | non-terminal    | marked failed, `yt.error.handled` emitted   |
//! | `failed`        | no write (first failure wins), no emission  |
//! | `completed`     | no write, logged at `warn`                  |
//! | not found       | rejected                                    |
//!
//! A failed store read or write has no fallback and is returned as
//! `HandlerError::Fatal`.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use titledoc_core::{JobPatch, JobStatus, Stage};
use titledoc_events::{ErrorHandled, Event, EventPayload, HandlerError, StageFailed, StepHandler, Topic};

use crate::pipeline::StepContext;
use crate::store::JOBS;

pub struct ErrorAggregator {
    ctx: StepContext,
}

impl ErrorAggregator {
    pub fn new(ctx: StepContext) -> Self {
        Self { ctx }
    }

    async fn fail_job(&self, topic: Topic, failure: StageFailed) -> Result<(), HandlerError> {
        if failure.error.trim().is_empty() {
            return Err(HandlerError::Rejected(format!(
                "malformed {topic} event for {}: error is blank",
                failure.job_id
            )));
        }

        let store = self.ctx.store();
        let Some(mut record) = store
            .get(JOBS, &failure.job_id)
            .await
            .map_err(|e| HandlerError::Fatal(format!("failed to load job {}: {e}", failure.job_id)))?
        else {
            return Err(HandlerError::Rejected(format!("job {} not found", failure.job_id)));
        };

        match record.status {
            JobStatus::Failed => {
                info!(job_id = %failure.job_id, %topic, "job already failed; keeping first error");
                return Ok(());
            }
            JobStatus::Completed => {
                warn!(job_id = %failure.job_id, %topic, error = %failure.error, "failure reported for completed job; ignoring");
                return Ok(());
            }
            _ => {}
        }

        let failed_at = Utc::now();
        let from = record.status;
        record
            .apply_patch(
                Stage::ErrorAggregator,
                &JobPatch::failed(failure.error.clone(), failed_at),
                failed_at,
            )
            .map_err(|e| HandlerError::Rejected(e.to_string()))?;

        store
            .set(JOBS, &record.job_id, &record)
            .await
            .map_err(|e| HandlerError::Fatal(format!("failed to mark job {} failed: {e}", record.job_id)))?;

        info!(job_id = %record.job_id, %topic, %from, error = %failure.error, "job marked as failed");

        self.ctx.emitter().emit_after_commit(
            Topic::ErrorHandled,
            ErrorHandled {
                job_id: record.job_id.clone(),
                email: failure.email.or_else(|| Some(record.email.clone())),
                error: failure.error,
                failed_at,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StepHandler for ErrorAggregator {
    fn name(&self) -> &'static str {
        "error_aggregator"
    }

    fn topics(&self) -> &'static [Topic] {
        &Topic::FAILURES
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let topic = event.topic();
        match event.into_payload() {
            EventPayload::StageFailed(failure) => self.fail_job(topic, failure).await,
            other => Err(HandlerError::Rejected(format!(
                "error_aggregator cannot handle a {} payload",
                other.kind()
            ))),
        }
    }
}
