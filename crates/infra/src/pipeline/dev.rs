//! In-process collaborators for tests and the dev binary.
//!
//! None of these talk to the network. They are deterministic enough to
//! script end-to-end scenarios (unknown channel, empty catalog, ...).

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use titledoc_core::{ImprovedTitle, Video};

use super::collaborators::{
    ChannelResolver, CollaboratorError, EmailDigest, Mailer, ResolvedChannel, TitleGenerator,
    VideoSource,
};

fn lock_error() -> CollaboratorError {
    CollaboratorError::Upstream("collaborator state lock poisoned".to_string())
}

/// Handle → channel directory. Raw channel ids (`UC…`) resolve to themselves.
#[derive(Debug, Default)]
pub struct InMemoryChannelDirectory {
    channels: RwLock<HashMap<String, ResolvedChannel>>,
}

impl InMemoryChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(self, handle: &str, id: &str, name: &str) -> Self {
        self.register(handle, id, name);
        self
    }

    pub fn register(&self, handle: &str, id: &str, name: &str) {
        if let Ok(mut channels) = self.channels.write() {
            channels.insert(
                normalize_handle(handle),
                ResolvedChannel {
                    id: id.to_string(),
                    name: name.to_string(),
                },
            );
        }
    }
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

fn looks_like_channel_id(value: &str) -> bool {
    value.len() > 2 && value.starts_with("UC") && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait]
impl ChannelResolver for InMemoryChannelDirectory {
    async fn resolve(&self, channel: &str) -> Result<ResolvedChannel, CollaboratorError> {
        let channels = self.channels.read().map_err(|_| lock_error())?;
        if let Some(found) = channels.get(&normalize_handle(channel)) {
            return Ok(found.clone());
        }

        let channel = channel.trim();
        if looks_like_channel_id(channel) {
            return Ok(ResolvedChannel {
                id: channel.to_string(),
                name: channel.to_string(),
            });
        }
        Err(CollaboratorError::NotFound(format!("channel {channel}")))
    }
}

/// Videos per channel id. Unknown channels have no videos.
#[derive(Debug, Default)]
pub struct InMemoryVideoCatalog {
    videos: RwLock<HashMap<String, Vec<Video>>>,
}

impl InMemoryVideoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_videos(self, channel_id: &str, videos: Vec<Video>) -> Self {
        self.insert(channel_id, videos);
        self
    }

    pub fn insert(&self, channel_id: &str, videos: Vec<Video>) {
        if let Ok(mut catalog) = self.videos.write() {
            catalog.entry(channel_id.to_string()).or_default().extend(videos);
        }
    }

    /// A catalog of `count` synthetic uploads for `channel_id`.
    pub fn sample(channel_id: &str, count: usize) -> Self {
        let videos = (1..=count)
            .map(|n| Video {
                video_id: format!("{channel_id}-v{n}"),
                title: format!("upload number {n}"),
                url: format!("https://www.youtube.com/watch?v={channel_id}-v{n}"),
                published_at: format!("2024-01-{n:02}T12:00:00Z"),
                thumbnail_url: format!("https://i.ytimg.com/vi/{channel_id}-v{n}/default.jpg"),
            })
            .collect();
        Self::new().with_videos(channel_id, videos)
    }
}

#[async_trait]
impl VideoSource for InMemoryVideoCatalog {
    async fn latest_videos(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<Video>, CollaboratorError> {
        let catalog = self.videos.read().map_err(|_| lock_error())?;
        let mut videos = catalog.get(channel_id).cloned().unwrap_or_default();
        // RFC3339 timestamps sort lexicographically.
        videos.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        videos.truncate(limit);
        Ok(videos)
    }
}

/// Rewrites each title with a fixed template.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateTitleGenerator;

#[async_trait]
impl TitleGenerator for TemplateTitleGenerator {
    async fn improve(
        &self,
        channel_name: &str,
        videos: &[Video],
    ) -> Result<Vec<ImprovedTitle>, CollaboratorError> {
        if videos.is_empty() {
            return Err(CollaboratorError::InvalidResponse("no titles to improve".to_string()));
        }

        Ok(videos
            .iter()
            .map(|video| ImprovedTitle {
                original: video.title.clone(),
                improved: format!("{} | {}", capitalize(video.title.trim()), channel_name),
                rationale: "Leads with a capitalized hook and carries the channel name.".to_string(),
                url: video.url.clone(),
            })
            .collect())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Records every digest instead of delivering it.
#[derive(Debug, Default)]
pub struct OutboxMailer {
    sent: Mutex<Vec<(String, EmailDigest)>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered digests with their message ids, oldest first.
    pub fn sent(&self) -> Vec<(String, EmailDigest)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, digest: &EmailDigest) -> Result<String, CollaboratorError> {
        let id = format!("email-{}", Uuid::now_v7().simple());
        self.sent
            .lock()
            .map_err(|_| lock_error())?
            .push((id.clone(), digest.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directory_resolves_handles_and_passes_ids_through() {
        let directory = InMemoryChannelDirectory::new().with_channel("@RustTalks", "UCrust", "Rust Talks");

        let by_handle = directory.resolve("rusttalks").await.unwrap();
        assert_eq!(by_handle.id, "UCrust");
        assert_eq!(by_handle.name, "Rust Talks");

        let by_id = directory.resolve("UCabc").await.unwrap();
        assert_eq!(by_id.id, "UCabc");

        assert!(matches!(
            directory.resolve("nobody").await,
            Err(CollaboratorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn catalog_returns_newest_first_up_to_limit() {
        let catalog = InMemoryVideoCatalog::sample("UCabc", 7);

        let videos = catalog.latest_videos("UCabc", 5).await.unwrap();

        assert_eq!(videos.len(), 5);
        assert_eq!(videos[0].video_id, "UCabc-v7");
        assert_eq!(videos[4].video_id, "UCabc-v3");
        assert!(catalog.latest_videos("UCother", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generator_keeps_input_order() {
        let catalog = InMemoryVideoCatalog::sample("UCabc", 2);
        let videos = catalog.latest_videos("UCabc", 5).await.unwrap();

        let titles = TemplateTitleGenerator.improve("Rust Talks", &videos).await.unwrap();

        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].original, videos[0].title);
        assert_eq!(titles[0].improved, "Upload number 2 | Rust Talks");
        assert_eq!(titles[1].url, videos[1].url);
    }

    #[tokio::test]
    async fn outbox_records_digests() {
        let mailer = OutboxMailer::new();
        let digest = EmailDigest::compose("a@b.com", "Rust Talks", &[]);

        let id = mailer.send(&digest).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, id);
        assert_eq!(sent[0].1.to, "a@b.com");
    }
}
