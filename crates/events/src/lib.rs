//! Topics, payloads and the event router that drives the pipeline.
//!
//! Step handlers never call each other. Each one subscribes to topics, does
//! its work against the job store, and emits the next topic through an
//! [`Emitter`].

pub mod bus;
pub mod emitter;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod in_memory_bus;
pub mod payload;
pub mod router;
pub mod topic;

pub use bus::{EventBus, Subscription};
pub use emitter::Emitter;
pub use envelope::Event;
pub use error::{BusError, EmitError, EventError, HandlerError};
pub use handler::StepHandler;
pub use in_memory_bus::InMemoryEventBus;
pub use payload::{
    ChannelResolved, EmailSent, ErrorHandled, EventPayload, StageFailed, Submitted, TitlesReady,
    VideosFetched,
};
pub use router::{DispatchStats, EventRouter, Invocation, RouterBuilder, RouterHandle};
pub use topic::Topic;
