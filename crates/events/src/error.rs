use thiserror::Error;

use crate::topic::Topic;

/// An event failed validation at the router boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("topic {topic} does not carry a {payload} payload")]
    TopicMismatch { topic: Topic, payload: &'static str },

    #[error("malformed {topic} payload: {reason}")]
    Malformed { topic: Topic, reason: String },
}

impl EventError {
    pub fn malformed(topic: Topic, reason: impl Into<String>) -> Self {
        Self::Malformed {
            topic,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Publish failed due to internal lock poisoning.
    #[error("event bus lock poisoned")]
    Poisoned,

    /// The transport refused the message (closed, unreachable, ...).
    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// Emission failed: either the event was invalid or the bus refused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error(transparent)]
    Invalid(#[from] EventError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Outcome of a failed handler invocation, as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The event could not be acted upon (malformed, uncorrelatable). Logged and counted.
    #[error("rejected: {0}")]
    Rejected(String),

    /// No fallback exists for this failure; surfaced to the operator.
    #[error("fatal: {0}")]
    Fatal(String),
}
