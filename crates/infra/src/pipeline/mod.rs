//! The job pipeline: collaborator stages and their wiring.

pub mod collaborators;
pub mod context;
pub mod dev;
pub mod steps;

use std::sync::Arc;

use titledoc_events::RouterBuilder;

pub use collaborators::{
    ChannelResolver, CollaboratorError, EmailDigest, LATEST_VIDEO_LIMIT, Mailer, ResolvedChannel,
    TitleGenerator, VideoSource,
};
pub use context::{StepContext, StepError};
pub use steps::{FetchVideosStep, GenerateTitlesStep, ResolveChannelStep, SendEmailStep};

use crate::aggregator::ErrorAggregator;

/// One implementation per collaborator contract.
#[derive(Clone)]
pub struct Collaborators {
    pub channels: Arc<dyn ChannelResolver>,
    pub videos: Arc<dyn VideoSource>,
    pub titles: Arc<dyn TitleGenerator>,
    pub mailer: Arc<dyn Mailer>,
}

impl Collaborators {
    /// Dev collaborators: `UC…` ids resolve to themselves, the catalog is
    /// empty and mail goes to an in-memory outbox.
    pub fn in_memory() -> Self {
        Self {
            channels: Arc::new(dev::InMemoryChannelDirectory::new()),
            videos: Arc::new(dev::InMemoryVideoCatalog::new()),
            titles: Arc::new(dev::TemplateTitleGenerator),
            mailer: Arc::new(dev::OutboxMailer::new()),
        }
    }
}

/// Register every stage and the error aggregator on `builder`.
pub fn install(builder: RouterBuilder, ctx: &StepContext, collaborators: &Collaborators) -> RouterBuilder {
    builder
        .handler(ResolveChannelStep::new(ctx.clone(), collaborators.channels.clone()))
        .handler(FetchVideosStep::new(ctx.clone(), collaborators.videos.clone()))
        .handler(GenerateTitlesStep::new(ctx.clone(), collaborators.titles.clone()))
        .handler(SendEmailStep::new(ctx.clone(), collaborators.mailer.clone()))
        .handler(ErrorAggregator::new(ctx.clone()))
}
