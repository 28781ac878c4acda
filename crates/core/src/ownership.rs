//! Pipeline stages and the record fields each of them owns.

use serde::{Deserialize, Serialize};

/// A writer of job records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Entry point; creates the record and owns the immutable fields.
    Submission,
    ChannelResolution,
    VideoListing,
    TitleGeneration,
    EmailDispatch,
    /// The only writer allowed to fail a job.
    ErrorAggregator,
}

impl Stage {
    /// Collaborator stages, in pipeline order.
    pub const COLLABORATORS: [Stage; 4] = [
        Stage::ChannelResolution,
        Stage::VideoListing,
        Stage::TitleGeneration,
        Stage::EmailDispatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Submission => "submission",
            Stage::ChannelResolution => "channel_resolution",
            Stage::VideoListing => "video_listing",
            Stage::TitleGeneration => "title_generation",
            Stage::EmailDispatch => "email_dispatch",
            Stage::ErrorAggregator => "error_aggregator",
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable payload fields of a job record.
///
/// `jobId`, `channel`, `email` and `createdAt` are immutable and therefore not
/// listed; `status` and `updatedAt` are written by every stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordField {
    ChannelId,
    ChannelName,
    Videos,
    ImprovedTitles,
    EmailId,
    CompletedAt,
    Error,
    FailedAt,
}

impl RecordField {
    pub fn owner(self) -> Stage {
        match self {
            RecordField::ChannelId | RecordField::ChannelName => Stage::ChannelResolution,
            RecordField::Videos => Stage::VideoListing,
            RecordField::ImprovedTitles => Stage::TitleGeneration,
            RecordField::EmailId | RecordField::CompletedAt => Stage::EmailDispatch,
            RecordField::Error | RecordField::FailedAt => Stage::ErrorAggregator,
        }
    }

    /// Wire (camelCase) name.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::ChannelId => "channelId",
            RecordField::ChannelName => "channelName",
            RecordField::Videos => "videos",
            RecordField::ImprovedTitles => "improvedTitles",
            RecordField::EmailId => "emailId",
            RecordField::CompletedAt => "completedAt",
            RecordField::Error => "error",
            RecordField::FailedAt => "failedAt",
        }
    }
}

impl core::fmt::Display for RecordField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
