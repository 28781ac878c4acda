//! Contracts of the external services each stage delegates to.
//!
//! Implementations own their transport, credentials and retries. A stage only
//! sees the result or a [`CollaboratorError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use titledoc_core::{ImprovedTitle, Video};

/// How many recent videos a job works on.
pub const LATEST_VIDEO_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub id: String,
    pub name: String,
}

/// Turns a user-supplied channel reference (handle, name or id) into a channel id.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    async fn resolve(&self, channel: &str) -> Result<ResolvedChannel, CollaboratorError>;
}

/// Lists a channel's most recent uploads, newest first.
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn latest_videos(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<Video>, CollaboratorError>;
}

/// Suggests better titles; one suggestion per input video, in input order.
#[async_trait]
pub trait TitleGenerator: Send + Sync {
    async fn improve(
        &self,
        channel_name: &str,
        videos: &[Video],
    ) -> Result<Vec<ImprovedTitle>, CollaboratorError>;
}

/// Delivers the suggestion digest and returns the provider's message id.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, digest: &EmailDigest) -> Result<String, CollaboratorError>;
}

/// Plain-text email listing the suggestions for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDigest {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl EmailDigest {
    pub fn compose(to: impl Into<String>, channel_name: &str, titles: &[ImprovedTitle]) -> Self {
        let mut text = format!("YouTube title suggestions for {channel_name}\n\n");
        for (idx, title) in titles.iter().enumerate() {
            text.push_str(&format!("Video {}:\n", idx + 1));
            text.push_str(&format!("Original: {}\n", title.original));
            text.push_str(&format!("Improved title: {}\n", title.improved));
            text.push_str(&format!("Why: {}\n", title.rationale));
            text.push_str(&format!("Watch: {}\n\n", title.url));
        }

        Self {
            to: to.into(),
            subject: format!("New Titles for {channel_name}"),
            text,
        }
    }
}
