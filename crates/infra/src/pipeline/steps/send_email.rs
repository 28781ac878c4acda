use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use titledoc_core::{JobPatch, JobStatus, Stage};
use titledoc_events::{EmailSent, Event, EventPayload, HandlerError, StepHandler, TitlesReady, Topic};

use super::unexpected_payload;
use crate::pipeline::collaborators::{EmailDigest, Mailer};
use crate::pipeline::context::{StepContext, StepError};

const STAGE: Stage = Stage::EmailDispatch;
const FAILURE_MESSAGE: &str = "Failed to send email. Please try again.";

/// `yt.titles.ready` → `yt.email.sent`; completes the job.
pub struct SendEmailStep {
    ctx: StepContext,
    mailer: Arc<dyn Mailer>,
}

impl SendEmailStep {
    pub fn new(ctx: StepContext, mailer: Arc<dyn Mailer>) -> Self {
        Self { ctx, mailer }
    }

    async fn run(&self, input: &TitlesReady) -> Result<(), StepError> {
        let Some(mut record) = self
            .ctx
            .claim(STAGE, &input.job_id, &[JobStatus::SendingEmail])
            .await?
        else {
            return Ok(());
        };

        let digest = EmailDigest::compose(&input.email, &input.channel_name, &input.improved_titles);
        let email_id = self.mailer.send(&digest).await?;
        info!(job_id = %input.job_id, %email_id, "email sent");

        let written = self
            .ctx
            .write(STAGE, &mut record, JobPatch::email_sent(email_id.clone(), Utc::now()))
            .await?;
        if !written {
            warn!(job_id = %input.job_id, %email_id, "email went out for a job that no longer awaits it");
            return Ok(());
        }

        self.ctx.emitter().emit_after_commit(
            Topic::EmailSent,
            EmailSent {
                job_id: input.job_id.clone(),
                email: input.email.clone(),
                email_id,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StepHandler for SendEmailStep {
    fn name(&self) -> &'static str {
        "send_email"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::TitlesReady]
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let input = match event.into_payload() {
            EventPayload::TitlesReady(input) => input,
            other => return Err(unexpected_payload(self.name(), &other)),
        };

        if let Err(err) = self.run(&input).await {
            error!(job_id = %input.job_id, error = %err, "email dispatch failed");
            self.ctx
                .report_failure(STAGE, &input.job_id, &input.email, FAILURE_MESSAGE);
        }
        Ok(())
    }
}
