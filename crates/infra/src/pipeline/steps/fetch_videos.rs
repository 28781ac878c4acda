use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use titledoc_core::{JobPatch, JobStatus, Stage};
use titledoc_events::{
    ChannelResolved, Event, EventPayload, HandlerError, StepHandler, Topic, VideosFetched,
};

use super::unexpected_payload;
use crate::pipeline::collaborators::{LATEST_VIDEO_LIMIT, VideoSource};
use crate::pipeline::context::{StepContext, StepError};

const STAGE: Stage = Stage::VideoListing;

/// `yt.channel.resolved` → `yt.videos.fetched`.
pub struct FetchVideosStep {
    ctx: StepContext,
    source: Arc<dyn VideoSource>,
}

impl FetchVideosStep {
    pub fn new(ctx: StepContext, source: Arc<dyn VideoSource>) -> Self {
        Self { ctx, source }
    }

    async fn run(&self, input: &ChannelResolved) -> Result<(), StepError> {
        let Some(mut record) = self
            .ctx
            .claim(STAGE, &input.job_id, &[JobStatus::FetchingVideos])
            .await?
        else {
            return Ok(());
        };

        let videos = self
            .source
            .latest_videos(&input.channel_id, LATEST_VIDEO_LIMIT)
            .await?;
        if videos.is_empty() {
            warn!(job_id = %input.job_id, channel_id = %input.channel_id, "no videos found for channel");
            return Err(StepError::NoVideos(input.channel_id.clone()));
        }
        info!(job_id = %input.job_id, video_count = videos.len(), "videos fetched");

        let written = self
            .ctx
            .write(STAGE, &mut record, JobPatch::videos_fetched(videos.clone()))
            .await?;
        if !written {
            return Ok(());
        }

        self.ctx.emitter().emit_after_commit(
            Topic::VideosFetched,
            VideosFetched {
                job_id: input.job_id.clone(),
                email: input.email.clone(),
                channel_name: input.channel_name.clone(),
                videos,
            },
        );
        Ok(())
    }
}

fn failure_message(err: &StepError) -> &'static str {
    match err {
        StepError::NoVideos(_) => "No videos found for this channel",
        _ => "Failed to fetch videos. Please try again.",
    }
}

#[async_trait]
impl StepHandler for FetchVideosStep {
    fn name(&self) -> &'static str {
        "fetch_videos"
    }

    fn topics(&self) -> &'static [Topic] {
        &[Topic::ChannelResolved]
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let input = match event.into_payload() {
            EventPayload::ChannelResolved(input) => input,
            other => return Err(unexpected_payload(self.name(), &other)),
        };

        if let Err(err) = self.run(&input).await {
            error!(job_id = %input.job_id, error = %err, "video listing failed");
            self.ctx
                .report_failure(STAGE, &input.job_id, &input.email, failure_message(&err));
        }
        Ok(())
    }
}
