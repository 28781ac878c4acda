use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use titledoc_core::{JobPatch, JobStatus, Stage};
use titledoc_events::{ChannelResolved, Event, EventPayload, HandlerError, StepHandler, Submitted, Topic};

use super::unexpected_payload;
use crate::pipeline::collaborators::ChannelResolver;
use crate::pipeline::context::{StepContext, StepError};

const STAGE: Stage = Stage::ChannelResolution;
const FAILURE_MESSAGE: &str = "Failed to resolve channel. Please try again.";

/// `yt.submit` → `yt.channel.resolved`.
///
/// Writes twice: first claims the job (`queued → resolving-channel`), then
/// records the resolved channel (`→ fetching-videos`). A job found already in
/// `resolving-channel` was claimed by an earlier delivery that did not finish
/// and is resumed.
pub struct ResolveChannelStep {
    ctx: StepContext,
    resolver: Arc<dyn ChannelResolver>,
}

impl ResolveChannelStep {
    pub fn new(ctx: StepContext, resolver: Arc<dyn ChannelResolver>) -> Self {
        Self { ctx, resolver }
    }

    async fn run(&self, input: &Submitted) -> Result<(), StepError> {
        let accepted = [JobStatus::Queued, JobStatus::ResolvingChannel];
        let Some(mut record) = self.ctx.claim(STAGE, &input.job_id, &accepted).await? else {
            return Ok(());
        };

        if record.status == JobStatus::Queued
            && !self
                .ctx
                .write(STAGE, &mut record, JobPatch::status(JobStatus::ResolvingChannel))
                .await?
        {
            return Ok(());
        }

        let channel = self.resolver.resolve(&record.channel).await?;
        info!(job_id = %input.job_id, channel_id = %channel.id, "channel resolved");

        let written = self
            .ctx
            .write(
                STAGE,
                &mut record,
                JobPatch::channel_resolved(channel.id.clone(), channel.name.clone()),
            )
            .await?;
        if !written {
            return Ok(());
        }

        self.ctx.emitter().emit_after_commit(
            Topic::ChannelResolved,
            ChannelResolved {
                job_id: input.job_id.clone(),
                email: record.email.clone(),
                channel_id: channel.id,
                channel_name: channel.name,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StepHandler for ResolveChannelStep {
    fn name(&self) -> &'static str {
        "resolve_channel"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::Submit]
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let input = match event.into_payload() {
            EventPayload::Submitted(input) => input,
            other => return Err(unexpected_payload(self.name(), &other)),
        };

        if let Err(err) = self.run(&input).await {
            error!(job_id = %input.job_id, channel = %input.channel, error = %err, "channel resolution failed");
            self.ctx
                .report_failure(STAGE, &input.job_id, &input.email, FAILURE_MESSAGE);
        }
        Ok(())
    }
}
