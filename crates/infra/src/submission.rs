//! Entry point of the pipeline: validates a request, creates the job record
//! and emits `yt.submit`.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::info;

use titledoc_core::{JobId, JobRecord};
use titledoc_events::{Submitted, Topic};

use crate::pipeline::StepContext;
use crate::store::{JOBS, StoreError};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const ACCEPTED_MESSAGE: &str = "Your job has been queued successfully. You should receive an email soon with improved suggestions for your videos.";

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Missing required fields: channel & email")]
    MissingFields,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Outcome of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub job_id: JobId,
    /// Whether `yt.submit` reached the bus. The job is queued either way.
    pub emitted: bool,
}

#[derive(Debug, Clone)]
pub struct SubmissionService {
    ctx: StepContext,
}

impl SubmissionService {
    pub fn new(ctx: StepContext) -> Self {
        Self { ctx }
    }

    /// Validate, persist a `queued` record, then emit `yt.submit`.
    ///
    /// Emission failure is logged and does not fail the submission.
    pub async fn submit(
        &self,
        channel: Option<&str>,
        email: Option<&str>,
    ) -> Result<Accepted, SubmissionError> {
        let channel = channel.map(str::trim).filter(|s| !s.is_empty());
        let email = email.map(str::trim).filter(|s| !s.is_empty());
        let (Some(channel), Some(email)) = (channel, email) else {
            return Err(SubmissionError::MissingFields);
        };
        if !is_valid_email(email) {
            return Err(SubmissionError::InvalidEmail);
        }

        let job_id = JobId::new();
        let record = JobRecord::queued(job_id.clone(), channel, email, Utc::now());
        self.ctx.store().set(JOBS, &job_id, &record).await?;
        info!(%job_id, %channel, %email, "job submitted");

        let emitted = self.ctx.emitter().emit_after_commit(
            Topic::Submit,
            Submitted {
                job_id: job_id.clone(),
                channel: channel.to_string(),
                email: email.to_string(),
            },
        );

        Ok(Accepted { job_id, emitted })
    }
}
