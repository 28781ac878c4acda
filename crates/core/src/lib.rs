//! `titledoc-core` — job record, state machine and merge-patch primitives.
//!
//! This crate contains **pure domain** types (no IO, no async).

pub mod error;
pub mod id;
pub mod ownership;
pub mod patch;
pub mod record;
pub mod status;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use ownership::{RecordField, Stage};
pub use patch::JobPatch;
pub use record::{ImprovedTitle, JobRecord, Video};
pub use status::JobStatus;
