//! Infrastructure layer: job store adapters, pipeline stages, failure
//! aggregation, stall detection and the submission entry point.

pub mod aggregator;
pub mod pipeline;
pub mod stall_sweep;
pub mod store;
pub mod submission;


pub use aggregator::ErrorAggregator;
pub use pipeline::{Collaborators, StepContext, StepError, install};
pub use stall_sweep::{StallSweep, SweepHandle};
pub use store::{InMemoryJobStore, JOBS, JobStore, PostgresJobStore, StoreError};
pub use submission::{ACCEPTED_MESSAGE, Accepted, SubmissionError, SubmissionService};
