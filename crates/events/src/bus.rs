//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is the transport between step handlers. It is intentionally
//! lightweight:
//!
//! - **At-least-once delivery**: events may be delivered more than once; handlers must be idempotent
//! - **No ordering guarantees** beyond a single producer's emission order
//! - **No persistence**: the job store is the source of truth, the bus only distributes
//! - **No backpressure**: publishing never waits for consumers
//!
//! Producers write to the job store first and publish second. A failed publish
//! therefore never invalidates a committed write; at worst the job stalls.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::BusError;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). A subscription is meant to be drained by a
/// single consumer task.
///
/// ```ignore
/// let mut subscription = bus.subscribe();
/// while let Some(event) = subscription.recv().await {
///     process(event).await;
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Try to receive a message without waiting.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Topic-agnostic pub/sub transport.
///
/// `publish` is synchronous and non-blocking from the producer's point of view.
/// Implementations must be `Send + Sync`; any number of tasks may publish
/// concurrently.
pub trait EventBus<M>: Send + Sync {
    fn publish(&self, message: M) -> Result<(), BusError>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
