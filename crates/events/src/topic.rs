//! Closed set of pipeline topics.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use titledoc_core::Stage;

use crate::error::EventError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Topic {
    Submit,
    ChannelResolved,
    ChannelError,
    VideosFetched,
    VideosError,
    TitlesReady,
    TitlesError,
    EmailSent,
    EmailError,
    /// Raised by the stall sweep for jobs stuck in a non-terminal status.
    JobStalled,
    /// Normalized notification emitted after the aggregator failed a job.
    ErrorHandled,
}

impl Topic {
    pub const ALL: [Topic; 11] = [
        Topic::Submit,
        Topic::ChannelResolved,
        Topic::ChannelError,
        Topic::VideosFetched,
        Topic::VideosError,
        Topic::TitlesReady,
        Topic::TitlesError,
        Topic::EmailSent,
        Topic::EmailError,
        Topic::JobStalled,
        Topic::ErrorHandled,
    ];

    /// Every topic the error aggregator consumes.
    pub const FAILURES: [Topic; 5] = [
        Topic::ChannelError,
        Topic::VideosError,
        Topic::TitlesError,
        Topic::EmailError,
        Topic::JobStalled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Submit => "yt.submit",
            Topic::ChannelResolved => "yt.channel.resolved",
            Topic::ChannelError => "yt.channel.error",
            Topic::VideosFetched => "yt.videos.fetched",
            Topic::VideosError => "yt.videos.error",
            Topic::TitlesReady => "yt.titles.ready",
            Topic::TitlesError => "yt.titles.error",
            Topic::EmailSent => "yt.email.sent",
            Topic::EmailError => "yt.email.error",
            Topic::JobStalled => "yt.job.stalled",
            Topic::ErrorHandled => "yt.error.handled",
        }
    }

    pub fn is_failure(self) -> bool {
        Topic::FAILURES.contains(&self)
    }

    /// Failure topic a collaborator stage reports on.
    pub fn failure_of(stage: Stage) -> Option<Topic> {
        match stage {
            Stage::ChannelResolution => Some(Topic::ChannelError),
            Stage::VideoListing => Some(Topic::VideosError),
            Stage::TitleGeneration => Some(Topic::TitlesError),
            Stage::EmailDispatch => Some(Topic::EmailError),
            Stage::Submission | Stage::ErrorAggregator => None,
        }
    }

    /// Success topic a collaborator stage emits on.
    pub fn success_of(stage: Stage) -> Option<Topic> {
        match stage {
            Stage::Submission => Some(Topic::Submit),
            Stage::ChannelResolution => Some(Topic::ChannelResolved),
            Stage::VideoListing => Some(Topic::VideosFetched),
            Stage::TitleGeneration => Some(Topic::TitlesReady),
            Stage::EmailDispatch => Some(Topic::EmailSent),
            Stage::ErrorAggregator => Some(Topic::ErrorHandled),
        }
    }
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EventError::UnknownTopic(s.to_string()))
    }
}

impl TryFrom<String> for Topic {
    type Error = EventError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topic> for &'static str {
    fn from(value: Topic) -> Self {
        value.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_collaborator_stage_has_a_failure_topic_the_aggregator_hears() {
        for stage in Stage::COLLABORATORS {
            let topic = Topic::failure_of(stage).unwrap();
            assert!(topic.is_failure(), "{stage}");
        }
    }

    #[test]
    fn names_parse_back() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
        assert!(matches!(
            "yt.unknown".parse::<Topic>(),
            Err(EventError::UnknownTopic(_))
        ));
    }
}
