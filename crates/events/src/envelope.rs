use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use titledoc_core::JobId;

use crate::error::EventError;
use crate::payload::EventPayload;
use crate::topic::Topic;

/// An ephemeral pipeline message: a topic plus its typed payload.
///
/// Not persisted by the core. Construction validates the payload against the
/// topic, and the wire form is re-validated on deserialization, so an
/// `Event` in hand is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    event_id: Uuid,
    topic: Topic,
    emitted_at: DateTime<Utc>,
    payload: EventPayload,
}

impl Event {
    pub fn new(topic: Topic, payload: impl Into<EventPayload>) -> Result<Self, EventError> {
        let payload = payload.into();
        payload.validate(topic)?;
        Ok(Self {
            event_id: Uuid::now_v7(),
            topic,
            emitted_at: Utc::now(),
            payload,
        })
    }

    /// Build an event from untyped data (e.g. a foreign producer).
    pub fn from_json(topic: &str, payload: JsonValue) -> Result<Self, EventError> {
        let topic: Topic = topic.parse()?;
        Self::new(topic, EventPayload::parse(topic, payload)?)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    pub fn job_id(&self) -> &JobId {
        self.payload.job_id()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn into_payload(self) -> EventPayload {
        self.payload
    }

    /// Re-check the topic/payload contract (events may arrive from a foreign bus).
    pub fn validate(&self) -> Result<(), EventError> {
        self.payload.validate(self.topic)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    event_id: Uuid,
    topic: String,
    emitted_at: DateTime<Utc>,
    payload: JsonValue,
}

impl TryFrom<RawEvent> for Event {
    type Error = EventError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let topic: Topic = raw.topic.parse()?;
        let payload = EventPayload::parse(topic, raw.payload)?;
        payload.validate(topic)?;
        Ok(Self {
            event_id: raw.event_id,
            topic,
            emitted_at: raw.emitted_at,
            payload,
        })
    }
}

/// Borrowed wire form; the payload is written inline by its own `Serialize`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent<'a> {
    event_id: Uuid,
    topic: &'static str,
    emitted_at: DateTime<Utc>,
    payload: &'a EventPayload,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEvent {
            event_id: self.event_id,
            topic: self.topic.as_str(),
            emitted_at: self.emitted_at,
            payload: &self.payload,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_builds_typed_events() {
        let event = Event::from_json(
            "yt.submit",
            json!({ "jobId": "job-1", "channel": "UCabc", "email": "a@b.com" }),
        )
        .unwrap();
        assert_eq!(event.topic(), Topic::Submit);
        assert_eq!(event.job_id().as_str(), "job-1");
        assert!(matches!(event.payload(), EventPayload::Submitted(_)));
    }

    #[test]
    fn wire_form_is_revalidated() {
        let event = Event::from_json(
            "yt.videos.error",
            json!({ "jobId": "job-1", "email": "a@b.com", "error": "No videos found for this channel" }),
        )
        .unwrap();
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["topic"], "yt.videos.error");
        assert_eq!(wire["payload"]["error"], "No videos found for this channel");

        let back: Event = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(back, event);

        let mut tampered = wire;
        tampered["topic"] = json!("yt.titles.ready");
        assert!(serde_json::from_value::<Event>(tampered).is_err());
    }

    #[test]
    fn wire_form_carries_the_full_payload() {
        let event = Event::from_json(
            "yt.email.sent",
            json!({ "jobId": "job-7", "email": "a@b.com", "emailId": "email-1" }),
        )
        .unwrap();
        let wire = serde_json::to_value(&event).unwrap();

        assert_eq!(wire["eventId"], json!(event.event_id()));
        assert_eq!(wire["emittedAt"], json!(event.emitted_at()));
        assert_eq!(
            wire["payload"],
            json!({ "jobId": "job-7", "email": "a@b.com", "emailId": "email-1" })
        );
    }

    #[test]
    fn unknown_topics_are_rejected() {
        let err = Event::from_json("yt.nope", json!({ "jobId": "job-1" })).unwrap_err();
        assert_eq!(err, EventError::UnknownTopic("yt.nope".to_string()));
    }
}
