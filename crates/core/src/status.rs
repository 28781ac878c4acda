//! Job state machine.
//!
//! The single authoritative transition table for the pipeline. Every writer
//! consults [`JobStatus::check_transition`] (through `JobRecord::apply_patch`)
//! before a status change is persisted.
//!
//! ```text
//! queued → resolving-channel → fetching-videos → generating-titles → sending-email → completed
//!    └──────────────┴──────────────────┴──────────────────┴─────────────────┴──→ failed
//! ```

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::ownership::RecordField;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Queued,
    ResolvingChannel,
    FetchingVideos,
    GeneratingTitles,
    SendingEmail,
    Completed,
    Failed,
}

impl JobStatus {
    /// Happy-path order.
    pub const HAPPY_PATH: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::ResolvingChannel,
        JobStatus::FetchingVideos,
        JobStatus::GeneratingTitles,
        JobStatus::SendingEmail,
        JobStatus::Completed,
    ];

    pub const ALL: [JobStatus; 7] = [
        JobStatus::Queued,
        JobStatus::ResolvingChannel,
        JobStatus::FetchingVideos,
        JobStatus::GeneratingTitles,
        JobStatus::SendingEmail,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::ResolvingChannel => "resolving-channel",
            JobStatus::FetchingVideos => "fetching-videos",
            JobStatus::GeneratingTitles => "generating-titles",
            JobStatus::SendingEmail => "sending-email",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Next status on the happy path (`None` for terminal states).
    pub fn next(self) -> Option<JobStatus> {
        match self {
            JobStatus::Queued => Some(JobStatus::ResolvingChannel),
            JobStatus::ResolvingChannel => Some(JobStatus::FetchingVideos),
            JobStatus::FetchingVideos => Some(JobStatus::GeneratingTitles),
            JobStatus::GeneratingTitles => Some(JobStatus::SendingEmail),
            JobStatus::SendingEmail => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    /// Whether `self -> to` is an edge of the state machine.
    pub fn can_transition_to(self, to: JobStatus) -> bool {
        match to {
            JobStatus::Failed => !self.is_terminal(),
            _ => self.next() == Some(to),
        }
    }

    pub fn check_transition(self, to: JobStatus) -> DomainResult<()> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(DomainError::IllegalTransition { from: self, to })
        }
    }

    /// Payload fields a record must carry while in this status.
    pub fn required_fields(self) -> &'static [RecordField] {
        use RecordField::*;
        match self {
            JobStatus::Queued | JobStatus::ResolvingChannel => &[],
            JobStatus::FetchingVideos => &[ChannelId],
            JobStatus::GeneratingTitles => &[ChannelId, Videos],
            JobStatus::SendingEmail => &[ChannelId, Videos, ImprovedTitles],
            JobStatus::Completed => &[ChannelId, Videos, ImprovedTitles, EmailId, CompletedAt],
            JobStatus::Failed => &[Error, FailedAt],
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job status: {s}")))
    }
}
