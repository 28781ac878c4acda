//! Typed event payloads: one variant per topic family.
//!
//! Every payload carries `jobId`. Payloads are parsed against their topic
//! before dispatch, so a handler never sees a field it is entitled to read
//! missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use titledoc_core::{ImprovedTitle, JobId, Video};

use crate::error::EventError;
use crate::topic::Topic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub job_id: JobId,
    pub channel: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResolved {
    pub job_id: JobId,
    pub email: String,
    pub channel_id: String,
    pub channel_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideosFetched {
    pub job_id: JobId,
    pub email: String,
    pub channel_name: String,
    pub videos: Vec<Video>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitlesReady {
    pub job_id: JobId,
    pub email: String,
    pub channel_name: String,
    pub improved_titles: Vec<ImprovedTitle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSent {
    pub job_id: JobId,
    pub email: String,
    pub email_id: String,
}

/// Normalized failure report, shared by every failure topic.
///
/// `error` is checked by the aggregator rather than here so that a blank
/// message surfaces as an aggregator error instead of vanishing at the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailed {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandled {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Submitted(Submitted),
    ChannelResolved(ChannelResolved),
    VideosFetched(VideosFetched),
    TitlesReady(TitlesReady),
    EmailSent(EmailSent),
    StageFailed(StageFailed),
    ErrorHandled(ErrorHandled),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Submitted(_) => "submitted",
            EventPayload::ChannelResolved(_) => "channel_resolved",
            EventPayload::VideosFetched(_) => "videos_fetched",
            EventPayload::TitlesReady(_) => "titles_ready",
            EventPayload::EmailSent(_) => "email_sent",
            EventPayload::StageFailed(_) => "stage_failed",
            EventPayload::ErrorHandled(_) => "error_handled",
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            EventPayload::Submitted(p) => &p.job_id,
            EventPayload::ChannelResolved(p) => &p.job_id,
            EventPayload::VideosFetched(p) => &p.job_id,
            EventPayload::TitlesReady(p) => &p.job_id,
            EventPayload::EmailSent(p) => &p.job_id,
            EventPayload::StageFailed(p) => &p.job_id,
            EventPayload::ErrorHandled(p) => &p.job_id,
        }
    }

    /// Recipient address, when the payload carries one.
    pub fn email(&self) -> Option<&str> {
        match self {
            EventPayload::Submitted(p) => Some(&p.email),
            EventPayload::ChannelResolved(p) => Some(&p.email),
            EventPayload::VideosFetched(p) => Some(&p.email),
            EventPayload::TitlesReady(p) => Some(&p.email),
            EventPayload::EmailSent(p) => Some(&p.email),
            EventPayload::StageFailed(p) => p.email.as_deref(),
            EventPayload::ErrorHandled(p) => p.email.as_deref(),
        }
    }

    /// Whether this payload variant may travel on `topic`.
    pub fn fits(&self, topic: Topic) -> bool {
        matches!(
            (self, topic),
            (EventPayload::Submitted(_), Topic::Submit)
                | (EventPayload::ChannelResolved(_), Topic::ChannelResolved)
                | (EventPayload::VideosFetched(_), Topic::VideosFetched)
                | (EventPayload::TitlesReady(_), Topic::TitlesReady)
                | (EventPayload::EmailSent(_), Topic::EmailSent)
                | (EventPayload::ErrorHandled(_), Topic::ErrorHandled)
        ) || (matches!(self, EventPayload::StageFailed(_)) && topic.is_failure())
    }

    /// Parse an untyped JSON payload against the schema of `topic`.
    pub fn parse(topic: Topic, value: JsonValue) -> Result<Self, EventError> {
        fn typed<T: serde::de::DeserializeOwned>(
            topic: Topic,
            value: JsonValue,
        ) -> Result<T, EventError> {
            serde_json::from_value(value).map_err(|e| EventError::malformed(topic, e.to_string()))
        }

        let payload = match topic {
            Topic::Submit => EventPayload::Submitted(typed(topic, value)?),
            Topic::ChannelResolved => EventPayload::ChannelResolved(typed(topic, value)?),
            Topic::VideosFetched => EventPayload::VideosFetched(typed(topic, value)?),
            Topic::TitlesReady => EventPayload::TitlesReady(typed(topic, value)?),
            Topic::EmailSent => EventPayload::EmailSent(typed(topic, value)?),
            Topic::ErrorHandled => EventPayload::ErrorHandled(typed(topic, value)?),
            Topic::ChannelError
            | Topic::VideosError
            | Topic::TitlesError
            | Topic::EmailError
            | Topic::JobStalled => EventPayload::StageFailed(typed(topic, value)?),
        };
        Ok(payload)
    }

    /// Field-level checks beyond what the schema enforces.
    pub fn validate(&self, topic: Topic) -> Result<(), EventError> {
        if !self.fits(topic) {
            return Err(EventError::TopicMismatch {
                topic,
                payload: self.kind(),
            });
        }
        let blank = |s: &str| s.trim().is_empty();
        match self {
            EventPayload::Submitted(p) if blank(&p.channel) => {
                Err(EventError::malformed(topic, "channel is blank"))
            }
            EventPayload::ChannelResolved(p) if blank(&p.channel_id) => {
                Err(EventError::malformed(topic, "channelId is blank"))
            }
            EventPayload::EmailSent(p) if blank(&p.email_id) => {
                Err(EventError::malformed(topic, "emailId is blank"))
            }
            EventPayload::StageFailed(_) | EventPayload::ErrorHandled(_) => Ok(()),
            p if p.email().is_none_or(blank) => Err(EventError::malformed(topic, "email is blank")),
            _ => Ok(()),
        }
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for EventPayload {
                fn from(value: $variant) -> Self {
                    EventPayload::$variant(value)
                }
            }
        )*
    };
}

impl_from_payload!(
    Submitted,
    ChannelResolved,
    VideosFetched,
    TitlesReady,
    EmailSent,
    StageFailed,
    ErrorHandled,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_payload_fits_every_failure_topic_only() {
        let payload = EventPayload::from(StageFailed {
            job_id: JobId::parse("job-1").unwrap(),
            email: Some("a@b.com".to_string()),
            error: "boom".to_string(),
        });
        for topic in Topic::ALL {
            assert_eq!(payload.fits(topic), topic.is_failure(), "{topic}");
        }
    }

    #[test]
    fn parse_rejects_missing_job_id() {
        let err = EventPayload::parse(
            Topic::VideosError,
            json!({ "email": "a@b.com", "error": "boom" }),
        )
        .unwrap_err();
        assert!(matches!(err, EventError::Malformed { topic: Topic::VideosError, .. }));
    }

    #[test]
    fn parse_rejects_blank_job_id() {
        let err = EventPayload::parse(
            Topic::Submit,
            json!({ "jobId": "", "channel": "UCabc", "email": "a@b.com" }),
        )
        .unwrap_err();
        assert!(matches!(err, EventError::Malformed { .. }));
    }

    #[test]
    fn success_payloads_need_an_email() {
        let payload = EventPayload::parse(
            Topic::ChannelResolved,
            json!({ "jobId": "job-1", "email": " ", "channelId": "UCabc", "channelName": "ABC" }),
        )
        .unwrap();
        assert!(payload.validate(Topic::ChannelResolved).is_err());
    }

    #[test]
    fn mismatched_topic_is_rejected() {
        let payload = EventPayload::from(EmailSent {
            job_id: JobId::parse("job-1").unwrap(),
            email: "a@b.com".to_string(),
            email_id: "em_1".to_string(),
        });
        assert_eq!(
            payload.validate(Topic::TitlesReady),
            Err(EventError::TopicMismatch {
                topic: Topic::TitlesReady,
                payload: "email_sent"
            })
        );
    }
}
