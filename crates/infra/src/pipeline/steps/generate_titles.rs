use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use titledoc_core::{JobPatch, JobStatus, Stage};
use titledoc_events::{Event, EventPayload, HandlerError, StepHandler, TitlesReady, Topic, VideosFetched};

use super::unexpected_payload;
use crate::pipeline::collaborators::{CollaboratorError, TitleGenerator};
use crate::pipeline::context::{StepContext, StepError};

const STAGE: Stage = Stage::TitleGeneration;
const FAILURE_MESSAGE: &str = "Failed to improve titles for the videos. Please try again.";

/// `yt.videos.fetched` → `yt.titles.ready`.
pub struct GenerateTitlesStep {
    ctx: StepContext,
    generator: Arc<dyn TitleGenerator>,
}

impl GenerateTitlesStep {
    pub fn new(ctx: StepContext, generator: Arc<dyn TitleGenerator>) -> Self {
        Self { ctx, generator }
    }

    async fn run(&self, input: &VideosFetched) -> Result<(), StepError> {
        let Some(mut record) = self
            .ctx
            .claim(STAGE, &input.job_id, &[JobStatus::GeneratingTitles])
            .await?
        else {
            return Ok(());
        };

        let improved = self
            .generator
            .improve(&input.channel_name, &input.videos)
            .await?;
        if improved.len() != input.videos.len() {
            return Err(CollaboratorError::InvalidResponse(format!(
                "expected {} suggestions, got {}",
                input.videos.len(),
                improved.len()
            ))
            .into());
        }
        info!(job_id = %input.job_id, count = improved.len(), "titles generated");

        let written = self
            .ctx
            .write(STAGE, &mut record, JobPatch::titles_ready(improved.clone()))
            .await?;
        if !written {
            return Ok(());
        }

        self.ctx.emitter().emit_after_commit(
            Topic::TitlesReady,
            TitlesReady {
                job_id: input.job_id.clone(),
                email: input.email.clone(),
                channel_name: input.channel_name.clone(),
                improved_titles: improved,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StepHandler for GenerateTitlesStep {
    fn name(&self) -> &'static str {
        "generate_titles"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::VideosFetched]
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let input = match event.into_payload() {
            EventPayload::VideosFetched(input) => input,
            other => return Err(unexpected_payload(self.name(), &other)),
        };

        if let Err(err) = self.run(&input).await {
            error!(job_id = %input.job_id, error = %err, "title generation failed");
            self.ctx
                .report_failure(STAGE, &input.job_id, &input.email, FAILURE_MESSAGE);
        }
        Ok(())
    }
}
