//! Merge-patch writes over a job record.
//!
//! A patch names only the fields a writer intends to change; everything else
//! on the record is preserved. `completedAt` and `failedAt` are set at most
//! once: a patch never moves an existing timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ownership::RecordField;
use crate::record::{ImprovedTitle, JobRecord, Video};
use crate::status::JobStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub videos: Option<Vec<Video>>,
    pub improved_titles: Option<Vec<ImprovedTitle>>,
    pub email_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl JobPatch {
    /// Status-only patch (e.g. a stage claiming a job).
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn channel_resolved(channel_id: impl Into<String>, channel_name: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::FetchingVideos),
            channel_id: Some(channel_id.into()),
            channel_name: Some(channel_name.into()),
            ..Self::default()
        }
    }

    pub fn videos_fetched(videos: Vec<Video>) -> Self {
        Self {
            status: Some(JobStatus::GeneratingTitles),
            videos: Some(videos),
            ..Self::default()
        }
    }

    pub fn titles_ready(improved_titles: Vec<ImprovedTitle>) -> Self {
        Self {
            status: Some(JobStatus::SendingEmail),
            improved_titles: Some(improved_titles),
            ..Self::default()
        }
    }

    pub fn email_sent(email_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            email_id: Some(email_id.into()),
            completed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            failed_at: Some(at),
            ..Self::default()
        }
    }

    /// Payload fields this patch writes (status excluded).
    pub fn touched_fields(&self) -> Vec<RecordField> {
        let mut fields = Vec::new();
        if self.channel_id.is_some() {
            fields.push(RecordField::ChannelId);
        }
        if self.channel_name.is_some() {
            fields.push(RecordField::ChannelName);
        }
        if self.videos.is_some() {
            fields.push(RecordField::Videos);
        }
        if self.improved_titles.is_some() {
            fields.push(RecordField::ImprovedTitles);
        }
        if self.email_id.is_some() {
            fields.push(RecordField::EmailId);
        }
        if self.completed_at.is_some() {
            fields.push(RecordField::CompletedAt);
        }
        if self.failed_at.is_some() {
            fields.push(RecordField::FailedAt);
        }
        if self.error.is_some() {
            fields.push(RecordField::Error);
        }
        fields
    }

    /// Merge without any state-machine checks; see `JobRecord::apply_patch`.
    pub fn merge_into(&self, record: &mut JobRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(v) = &self.channel_id {
            record.channel_id = Some(v.clone());
        }
        if let Some(v) = &self.channel_name {
            record.channel_name = Some(v.clone());
        }
        if let Some(v) = &self.videos {
            record.videos = Some(v.clone());
        }
        if let Some(v) = &self.improved_titles {
            record.improved_titles = Some(v.clone());
        }
        if let Some(v) = &self.email_id {
            record.email_id = Some(v.clone());
        }
        if let Some(at) = self.completed_at {
            record.completed_at.get_or_insert(at);
        }
        if let Some(at) = self.failed_at {
            record.failed_at.get_or_insert(at);
        }
        if let Some(v) = &self.error {
            record.error = Some(v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::JobId;
    use proptest::prelude::*;

    fn base() -> JobRecord {
        JobRecord::queued(JobId::parse("job-1").unwrap(), "UCabc", "a@b.com", Utc::now())
    }

    #[test]
    fn timestamps_are_set_once() {
        let mut record = base();
        let first = Utc::now();
        let later = first + chrono::Duration::seconds(30);

        JobPatch::failed("a", first).merge_into(&mut record);
        JobPatch::failed("b", later).merge_into(&mut record);

        assert_eq!(record.failed_at, Some(first));
        assert_eq!(record.error.as_deref(), Some("b"));
    }

    #[test]
    fn untouched_fields_survive() {
        let mut record = base();
        record.channel_id = Some("UCabc".to_string());

        JobPatch::status(JobStatus::FetchingVideos).merge_into(&mut record);

        assert_eq!(record.channel_id.as_deref(), Some("UCabc"));
        assert_eq!(record.channel, "UCabc");
        assert_eq!(record.email, "a@b.com");
    }

    fn any_patch() -> impl Strategy<Value = JobPatch> {
        (
            prop::option::of(prop::sample::select(JobStatus::ALL.to_vec())),
            prop::option::of("[a-zA-Z0-9]{1,12}"),
            prop::option::of("[a-z ]{0,20}"),
            prop::option::of("[a-z0-9]{1,8}"),
            prop::option::of(0i64..1_000_000),
        )
            .prop_map(|(status, channel_id, error, email_id, secs)| JobPatch {
                status,
                channel_id,
                error,
                email_id,
                completed_at: secs.map(|s| DateTime::<Utc>::from_timestamp(s, 0).unwrap()),
                ..JobPatch::default()
            })
    }

    proptest! {
        /// Property: merging the same patch twice yields the same record as
        /// merging it once (safe under at-least-once redelivery).
        #[test]
        fn merge_is_idempotent(patch in any_patch()) {
            let mut once = base();
            patch.merge_into(&mut once);

            let mut twice = once.clone();
            patch.merge_into(&mut twice);

            prop_assert_eq!(once, twice);
        }
    }
}
