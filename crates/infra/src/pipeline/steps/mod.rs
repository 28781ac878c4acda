//! Collaborator stages.
//!
//! Every stage follows the same shape:
//!
//! 1. claim the record (precondition status, otherwise a logged no-op)
//! 2. call its collaborator
//! 3. merge-patch the fields it owns and advance the status, unless the job
//!    left the claimed status meanwhile (then stop, again a no-op)
//! 4. emit its success topic
//!
//! Any error in steps 1-3 is logged with its cause and reported on the
//! stage's failure topic with a user-facing message.

mod fetch_videos;
mod generate_titles;
mod resolve_channel;
mod send_email;

pub use fetch_videos::FetchVideosStep;
pub use generate_titles::GenerateTitlesStep;
pub use resolve_channel::ResolveChannelStep;
pub use send_email::SendEmailStep;

use titledoc_events::{EventPayload, HandlerError};

fn unexpected_payload(step: &'static str, payload: &EventPayload) -> HandlerError {
    HandlerError::Rejected(format!("{step} cannot handle a {} payload", payload.kind()))
}
