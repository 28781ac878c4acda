//! The job record: the only persisted entity of the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::ownership::{RecordField, Stage};
use crate::patch::JobPatch;
use crate::status::JobStatus;

/// A video listed for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub published_at: String,
    pub thumbnail_url: String,
}

/// A suggested replacement for a video title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovedTitle {
    pub original: String,
    pub improved: String,
    pub rationale: String,
    pub url: String,
}

/// Durable state of one job, keyed by `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub channel: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<Video>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_titles: Option<Vec<ImprovedTitle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn queued(
        job_id: JobId,
        channel: impl Into<String>,
        email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            channel: channel.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
            channel_id: None,
            channel_name: None,
            videos: None,
            improved_titles: None,
            email_id: None,
            completed_at: None,
            failed_at: None,
            error: None,
        }
    }

    pub fn has_field(&self, field: RecordField) -> bool {
        match field {
            RecordField::ChannelId => self.channel_id.as_deref().is_some_and(|s| !s.is_empty()),
            RecordField::ChannelName => self.channel_name.is_some(),
            RecordField::Videos => self.videos.as_ref().is_some_and(|v| !v.is_empty()),
            RecordField::ImprovedTitles => self.improved_titles.is_some(),
            RecordField::EmailId => self.email_id.as_deref().is_some_and(|s| !s.is_empty()),
            RecordField::CompletedAt => self.completed_at.is_some(),
            RecordField::Error => self.error.as_deref().is_some_and(|s| !s.trim().is_empty()),
            RecordField::FailedAt => self.failed_at.is_some(),
        }
    }

    /// Required fields the record lacks for its current status.
    pub fn missing_fields(&self) -> Vec<RecordField> {
        self.status
            .required_fields()
            .iter()
            .copied()
            .filter(|f| !self.has_field(*f))
            .collect()
    }

    /// Check the per-status invariants (required fields, `error` only when failed).
    pub fn validate(&self) -> DomainResult<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            let names: Vec<_> = missing.iter().map(|f| f.as_str()).collect();
            return Err(DomainError::invariant(format!(
                "status {} requires {}",
                self.status,
                names.join(", ")
            )));
        }
        if self.status != JobStatus::Failed && self.error.is_some() {
            return Err(DomainError::invariant("error is only allowed on failed jobs"));
        }
        Ok(())
    }

    /// Merge `patch` into this record on behalf of `writer`.
    ///
    /// Rejects writes to fields owned by another stage, status changes that
    /// are not edges of the state machine, and results that would miss a
    /// field required by the new status. On error the record is unchanged.
    pub fn apply_patch(
        &mut self,
        writer: Stage,
        patch: &JobPatch,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if let Some(field) = patch.touched_fields().into_iter().find(|f| f.owner() != writer) {
            return Err(DomainError::invariant(format!(
                "{writer} may not write {field} (owned by {})",
                field.owner()
            )));
        }
        if let Some(to) = patch.status {
            self.status.check_transition(to)?;
        }

        let mut next = self.clone();
        patch.merge_into(&mut next);
        next.updated_at = now;
        next.validate()?;

        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(n: u32) -> Video {
        Video {
            video_id: format!("v{n}"),
            title: format!("Video {n}"),
            url: format!("https://www.youtube.com/watch?v=v{n}"),
            published_at: "2024-01-01T00:00:00Z".to_string(),
            thumbnail_url: format!("https://i.ytimg.com/vi/v{n}/default.jpg"),
        }
    }

    fn queued() -> JobRecord {
        JobRecord::queued(JobId::parse("job-1").unwrap(), "UCabc", "a@b.com", Utc::now())
    }

    #[test]
    fn serializes_with_camel_case_and_without_absent_fields() {
        let record = queued();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["status"], "queued");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("error").is_none());
        assert!(json.get("completedAt").is_none());
    }

    #[test]
    fn forward_transition_requires_the_next_stage_inputs() {
        let mut record = queued();
        record
            .apply_patch(
                Stage::ChannelResolution,
                &JobPatch::status(JobStatus::ResolvingChannel),
                Utc::now(),
            )
            .unwrap();

        let err = record
            .apply_patch(
                Stage::ChannelResolution,
                &JobPatch::status(JobStatus::FetchingVideos),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(record.status, JobStatus::ResolvingChannel);

        record
            .apply_patch(
                Stage::ChannelResolution,
                &JobPatch::channel_resolved("UCabc", "ABC"),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(record.status, JobStatus::FetchingVideos);
        assert_eq!(record.channel_id.as_deref(), Some("UCabc"));
    }

    #[test]
    fn foreign_field_writes_are_rejected() {
        let mut record = queued();
        let mut patch = JobPatch::status(JobStatus::ResolvingChannel);
        patch.videos = Some(vec![video(1)]);

        let err = record
            .apply_patch(Stage::ChannelResolution, &patch, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("videos")));
    }

    #[test]
    fn skipping_a_stage_is_illegal() {
        let mut record = queued();
        let err = record
            .apply_patch(
                Stage::ChannelResolution,
                &JobPatch::channel_resolved("UCabc", "ABC"),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::IllegalTransition {
                from: JobStatus::Queued,
                to: JobStatus::FetchingVideos
            }
        );
    }

    #[test]
    fn failure_preserves_stage_payload() {
        let mut record = queued();
        let now = Utc::now();
        record
            .apply_patch(Stage::ChannelResolution, &JobPatch::status(JobStatus::ResolvingChannel), now)
            .unwrap();
        record
            .apply_patch(Stage::ChannelResolution, &JobPatch::channel_resolved("UCabc", "ABC"), now)
            .unwrap();
        record
            .apply_patch(Stage::ErrorAggregator, &JobPatch::failed("boom", now), now)
            .unwrap();

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert_eq!(record.failed_at, Some(now));
        assert_eq!(record.channel_id.as_deref(), Some("UCabc"));
        assert_eq!(record.email, "a@b.com");
    }

    #[test]
    fn only_the_aggregator_may_fail_a_job() {
        let mut record = queued();
        let now = Utc::now();
        assert!(record
            .apply_patch(Stage::VideoListing, &JobPatch::failed("nope", now), now)
            .is_err());
        assert_eq!(record.status, JobStatus::Queued);
    }

    #[test]
    fn empty_video_list_does_not_satisfy_generating_titles() {
        let mut record = queued();
        record.status = JobStatus::FetchingVideos;
        record.channel_id = Some("UCabc".to_string());

        let err = record
            .apply_patch(Stage::VideoListing, &JobPatch::videos_fetched(vec![]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        record
            .apply_patch(Stage::VideoListing, &JobPatch::videos_fetched(vec![video(1)]), Utc::now())
            .unwrap();
        assert_eq!(record.status, JobStatus::GeneratingTitles);
    }
}
