use std::sync::Arc;

use tracing::warn;

use crate::bus::EventBus;
use crate::envelope::Event;
use crate::error::EmitError;
use crate::payload::EventPayload;
use crate::topic::Topic;

/// Validating publisher handed to every producer (entry point, step handlers).
///
/// All emissions go through [`Event::new`], so a payload that does not match
/// its topic never reaches the bus.
#[derive(Clone)]
pub struct Emitter {
    bus: Arc<dyn EventBus<Event>>,
}

impl Emitter {
    pub fn new<B>(bus: B) -> Self
    where
        B: EventBus<Event> + 'static,
    {
        Self { bus: Arc::new(bus) }
    }

    pub fn from_arc(bus: Arc<dyn EventBus<Event>>) -> Self {
        Self { bus }
    }

    /// Validate and publish. Returns the published event.
    pub fn emit(&self, topic: Topic, payload: impl Into<EventPayload>) -> Result<Event, EmitError> {
        let event = Event::new(topic, payload)?;
        self.publish(event.clone())?;
        Ok(event)
    }

    /// Publish an already-built event (re-validated).
    pub fn publish(&self, event: Event) -> Result<(), EmitError> {
        event.validate()?;
        self.bus.publish(event)?;
        Ok(())
    }

    /// Emit after a committed store write.
    ///
    /// Failure is logged and swallowed: the durable record stands even if no
    /// downstream handler ever observes it.
    pub fn emit_after_commit(&self, topic: Topic, payload: impl Into<EventPayload>) -> bool {
        let payload = payload.into();
        let job_id = payload.job_id().clone();
        match self.emit(topic, payload) {
            Ok(_) => true,
            Err(err) => {
                warn!(%job_id, %topic, error = %err, "event emission failed (non-blocking)");
                false
            }
        }
    }
}

impl core::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Emitter").finish_non_exhaustive()
    }
}
