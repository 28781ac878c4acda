//! Topic router: static subscriptions and concurrent dispatch.
//!
//! ```text
//! producer ──emit──▶ Emitter ──publish──▶ EventBus ──subscription──▶ dispatch loop
//!                                                                       │
//!                                        ┌──────────────────────────────┼───────────┐
//!                                        ▼                              ▼           ▼
//!                                  tokio task (handler A)        task (handler B)   ...
//! ```
//!
//! - Subscriptions are fixed when the router is built.
//! - Every event is re-validated before dispatch; invalid events are counted
//!   as rejected and never reach a handler.
//! - Each (event, handler) pair runs as its own task. The router imposes no
//!   ordering, timeout or concurrency limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::bus::{EventBus, Subscription};
use crate::emitter::Emitter;
use crate::envelope::Event;
use crate::error::{EmitError, HandlerError};
use crate::handler::StepHandler;
use crate::payload::EventPayload;
use crate::topic::Topic;

/// Router counters.
#[derive(Debug, Default)]
struct DispatchCounters {
    delivered: AtomicU64,
    rejected: AtomicU64,
    unrouted: AtomicU64,
    invocations: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    fatal: AtomicU64,
}

/// Snapshot of router statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Events received from the bus.
    pub delivered: u64,
    /// Events that failed validation before dispatch.
    pub rejected: u64,
    /// Valid events with no subscriber.
    pub unrouted: u64,
    /// Handler invocations started.
    pub invocations: u64,
    pub succeeded: u64,
    /// Invocations that returned `HandlerError::Rejected`.
    pub failed: u64,
    /// Invocations that returned `HandlerError::Fatal`.
    pub fatal: u64,
}

impl DispatchCounters {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
        }
    }
}

/// Result of one handler invocation for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub handler: &'static str,
    pub result: Result<(), HandlerError>,
}

/// Collects handlers before the subscription table is frozen.
pub struct RouterBuilder {
    bus: Arc<dyn EventBus<Event>>,
    handlers: Vec<Arc<dyn StepHandler>>,
}

impl RouterBuilder {
    pub fn new<B>(bus: B) -> Self
    where
        B: EventBus<Event> + 'static,
    {
        Self {
            bus: Arc::new(bus),
            handlers: Vec::new(),
        }
    }

    pub fn handler<H: StepHandler>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn shared_handler(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> EventRouter {
        let mut routes: HashMap<Topic, Vec<Arc<dyn StepHandler>>> = HashMap::new();
        for handler in &self.handlers {
            for topic in handler.topics() {
                routes.entry(*topic).or_default().push(handler.clone());
            }
        }
        EventRouter {
            emitter: Emitter::from_arc(self.bus.clone()),
            bus: self.bus,
            routes,
            counters: Arc::new(DispatchCounters::default()),
        }
    }
}

/// Topic-based dispatcher over an [`EventBus`].
pub struct EventRouter {
    bus: Arc<dyn EventBus<Event>>,
    emitter: Emitter,
    routes: HashMap<Topic, Vec<Arc<dyn StepHandler>>>,
    counters: Arc<DispatchCounters>,
}

impl EventRouter {
    pub fn builder<B>(bus: B) -> RouterBuilder
    where
        B: EventBus<Event> + 'static,
    {
        RouterBuilder::new(bus)
    }

    /// Validating publisher over this router's bus.
    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn emit(&self, topic: Topic, payload: impl Into<EventPayload>) -> Result<Event, EmitError> {
        self.emitter.emit(topic, payload)
    }

    /// Names of handlers subscribed to `topic`.
    pub fn subscribers(&self, topic: Topic) -> Vec<&'static str> {
        self.routes
            .get(&topic)
            .map(|hs| hs.iter().map(|h| h.name()).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Dispatch one event to all subscribers and wait for every invocation.
    ///
    /// Invocations still run concurrently with each other.
    pub async fn dispatch_one(&self, event: Event) -> Vec<Invocation> {
        let tasks = self.fan_out(event);
        let mut out = Vec::with_capacity(tasks.len());
        for (handler, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(HandlerError::Fatal(format!("handler task aborted: {join_err}"))),
            };
            out.push(Invocation { handler, result });
        }
        out
    }

    /// Subscribe to the bus and dispatch in the background.
    pub fn spawn(self: Arc<Self>) -> RouterHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let subscription = self.bus.subscribe();
        let counters = self.counters.clone();

        let join = tokio::spawn(dispatch_loop(self, subscription, shutdown_rx));

        RouterHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
            counters,
        }
    }

    fn fan_out(&self, event: Event) -> Vec<(&'static str, JoinHandle<Result<(), HandlerError>>)> {
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);

        if let Err(err) = event.validate() {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            error!(topic = %event.topic(), job_id = %event.job_id(), error = %err, "rejected malformed event");
            return Vec::new();
        }

        let Some(handlers) = self.routes.get(&event.topic()) else {
            self.counters.unrouted.fetch_add(1, Ordering::Relaxed);
            debug!(topic = %event.topic(), job_id = %event.job_id(), "no subscribers for topic");
            return Vec::new();
        };

        handlers
            .iter()
            .map(|handler| {
                let handler = handler.clone();
                let counters = self.counters.clone();
                let event = event.clone();
                let name = handler.name();
                (name, tokio::spawn(invoke(handler, event, counters)))
            })
            .collect()
    }
}

async fn invoke(
    handler: Arc<dyn StepHandler>,
    event: Event,
    counters: Arc<DispatchCounters>,
) -> Result<(), HandlerError> {
    counters.invocations.fetch_add(1, Ordering::Relaxed);

    let span = info_span!(
        "step",
        handler = handler.name(),
        topic = %event.topic(),
        job_id = %event.job_id(),
        event_id = %event.event_id(),
    );

    let result = handler.handle(event).instrument(span.clone()).await;

    span.in_scope(|| match &result {
        Ok(()) => {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
        }
        Err(HandlerError::Rejected(reason)) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(%reason, "handler rejected event");
        }
        Err(HandlerError::Fatal(reason)) => {
            counters.fatal.fetch_add(1, Ordering::Relaxed);
            error!(%reason, "handler failed fatally");
        }
    });
    result
}

async fn dispatch_loop(
    router: Arc<EventRouter>,
    mut subscription: Subscription<Event>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    info!(routes = router.routes.len(), "event router started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            next = subscription.recv() => match next {
                Some(event) => {
                    // Fire and forget: invocations report through counters and logs.
                    let _ = router.fan_out(event);
                }
                None => break,
            },
        }
    }

    info!("event router stopped");
}

/// Handle to control a running router.
#[derive(Debug)]
pub struct RouterHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
    counters: Arc<DispatchCounters>,
}

impl RouterHandle {
    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Stop receiving new events; in-flight invocations run to completion.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use titledoc_core::JobId;

    use super::*;
    use crate::in_memory_bus::InMemoryEventBus;
    use crate::payload::{StageFailed, Submitted};

    struct Recorder {
        name: &'static str,
        topics: &'static [Topic],
        seen: Arc<Mutex<Vec<String>>>,
        outcome: Result<(), HandlerError>,
    }

    #[async_trait]
    impl StepHandler for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn topics(&self) -> &'static [Topic] {
            self.topics
        }

        async fn handle(&self, event: Event) -> Result<(), HandlerError> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.job_id()));
            self.outcome.clone()
        }
    }

    fn recorder(
        name: &'static str,
        topics: &'static [Topic],
        seen: &Arc<Mutex<Vec<String>>>,
    ) -> Recorder {
        Recorder {
            name,
            topics,
            seen: seen.clone(),
            outcome: Ok(()),
        }
    }

    fn submitted(job: &str) -> Event {
        Event::new(
            Topic::Submit,
            Submitted {
                job_id: JobId::parse(job).unwrap(),
                channel: "UCabc".to_string(),
                email: "a@b.com".to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn dispatches_only_to_subscribers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = EventRouter::builder(Arc::new(InMemoryEventBus::new()))
            .handler(recorder("resolver", &[Topic::Submit], &seen))
            .handler(recorder("aggregator", &Topic::FAILURES, &seen))
            .build();

        let results = router.dispatch_one(submitted("job-1")).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].handler, "resolver");
        assert_eq!(*seen.lock().unwrap(), vec!["resolver:job-1".to_string()]);
        assert_eq!(router.subscribers(Topic::VideosError), vec!["aggregator"]);
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber_of_a_topic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = EventRouter::builder(Arc::new(InMemoryEventBus::new()))
            .handler(recorder("a", &[Topic::Submit], &seen))
            .handler(recorder("b", &[Topic::Submit], &seen))
            .build();

        let results = router.dispatch_one(submitted("job-1")).await;

        assert_eq!(results.len(), 2);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["a:job-1".to_string(), "b:job-1".to_string()]);
    }

    #[tokio::test]
    async fn handler_errors_are_counted_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let router = EventRouter::builder(Arc::new(InMemoryEventBus::new()))
            .handler(Recorder {
                outcome: Err(HandlerError::Fatal("store down".to_string())),
                ..recorder("aggregator", &Topic::FAILURES, &seen)
            })
            .build();

        let failure = Event::new(
            Topic::TitlesError,
            StageFailed {
                job_id: JobId::parse("job-9").unwrap(),
                email: None,
                error: "boom".to_string(),
            },
        )
        .unwrap();
        let results = router.dispatch_one(failure).await;

        assert!(matches!(results[0].result, Err(HandlerError::Fatal(_))));
        let stats = router.stats();
        assert_eq!(stats.invocations, 1);
        assert_eq!(stats.fatal, 1);
        assert_eq!(stats.succeeded, 0);
    }

    #[tokio::test]
    async fn unrouted_events_are_counted() {
        let router = EventRouter::builder(Arc::new(InMemoryEventBus::new())).build();
        let results = router.dispatch_one(submitted("job-1")).await;
        assert!(results.is_empty());
        assert_eq!(router.stats().unrouted, 1);
    }

    #[tokio::test]
    async fn spawned_router_consumes_emitted_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bus: Arc<InMemoryEventBus<Event>> = Arc::new(InMemoryEventBus::new());
        let router = Arc::new(
            EventRouter::builder(bus.clone())
                .handler(recorder("resolver", &[Topic::Submit], &seen))
                .build(),
        );
        let emitter = router.emitter();
        let handle = router.spawn();

        emitter
            .emit(
                Topic::Submit,
                Submitted {
                    job_id: JobId::parse("job-2").unwrap(),
                    channel: "UCabc".to_string(),
                    email: "a@b.com".to_string(),
                },
            )
            .unwrap();

        for _ in 0..100 {
            if handle.stats().succeeded == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(handle.stats().succeeded, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["resolver:job-2".to_string()]);
        handle.shutdown().await;
    }

    #[test]
    fn invalid_payloads_never_reach_the_bus() {
        let bus: Arc<InMemoryEventBus<Event>> = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe();
        let router = EventRouter::builder(bus.clone()).build();

        let err = router
            .emit(
                Topic::VideosFetched,
                Submitted {
                    job_id: JobId::parse("job-1").unwrap(),
                    channel: "UCabc".to_string(),
                    email: "a@b.com".to_string(),
                },
            )
            .unwrap_err();

        assert!(matches!(err, EmitError::Invalid(_)));
        assert!(sub.try_recv().is_err());
    }
}
