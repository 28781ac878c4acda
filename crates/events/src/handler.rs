use async_trait::async_trait;

use crate::envelope::Event;
use crate::error::HandlerError;
use crate::topic::Topic;

/// A pipeline step, invoked by the router when one of its topics fires.
///
/// Each invocation is an independent task; handlers share nothing in-process
/// except what they hold (store, emitter, collaborators). Because delivery is
/// at-least-once, `handle` must be idempotent: a redelivered event must not
/// change the job record beyond what a single delivery produced.
///
/// ## Error Semantics
///
/// - Stage failures are *not* errors here: a stage reports them by emitting
///   its failure topic and returns `Ok(())`.
/// - `HandlerError::Rejected`: the event could not be acted upon (e.g. no
///   correlation key). Logged and counted by the router.
/// - `HandlerError::Fatal`: no fallback exists (aggregator write failed).
///   Surfaced at `error` level.
#[async_trait]
pub trait StepHandler: Send + Sync + 'static {
    /// Stable name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Static subscription set; read once when the router is built.
    fn topics(&self) -> &'static [Topic];

    async fn handle(&self, event: Event) -> Result<(), HandlerError>;
}
