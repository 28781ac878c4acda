//! Detects jobs that stopped advancing.
//!
//! Emission failures are non-fatal by design of the pipeline, so a job can be
//! left in a non-terminal status with nothing in flight. The sweep finds
//! non-terminal records whose `updatedAt` is older than the timeout and
//! reports them on `yt.job.stalled`; the error aggregator then fails them.
//! The sweep itself never writes to the store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use titledoc_core::{JobId, JobRecord};
use titledoc_events::{StageFailed, Topic};

use crate::pipeline::StepContext;
use crate::store::{JOBS, StoreError};

/// Shortest period `spawn` will tick at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct StallSweep {
    ctx: StepContext,
    timeout: chrono::Duration,
}

impl StallSweep {
    pub fn new(ctx: StepContext, timeout: Duration) -> Self {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        Self { ctx, timeout }
    }

    pub fn is_stalled(&self, record: &JobRecord, now: DateTime<Utc>) -> bool {
        !record.status.is_terminal() && now - record.updated_at > self.timeout
    }

    /// Report every stalled job once. Returns the reported ids.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<Vec<JobId>, StoreError> {
        let records = self.ctx.store().list(JOBS).await?;

        let mut reported = Vec::new();
        for record in records.into_iter().filter(|r| self.is_stalled(r, now)) {
            warn!(job_id = %record.job_id, status = %record.status, updated_at = %record.updated_at, "job stalled");
            let emitted = self.ctx.emitter().emit_after_commit(
                Topic::JobStalled,
                StageFailed {
                    job_id: record.job_id.clone(),
                    email: Some(record.email.clone()),
                    error: format!("Job stalled in status {}", record.status),
                },
            );
            if emitted {
                reported.push(record.job_id);
            }
        }
        Ok(reported)
    }

    /// Run the sweep every `interval` (at least [`MIN_SWEEP_INTERVAL`])
    /// until the handle is shut down. The first pass runs immediately.
    pub fn spawn(self, interval: Duration) -> SweepHandle {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), timeout_secs = self.timeout.num_seconds(), "stall sweep started");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.run_once(Utc::now()).await {
                            warn!(error = %err, "stall sweep failed");
                        }
                    }
                }
            }
            info!("stall sweep stopped");
        });

        SweepHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

#[derive(Debug)]
pub struct SweepHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SweepHandle {
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
    use super::*;
    use std::sync::Arc;

    use titledoc_events::{Emitter, Event, EventBus, InMemoryEventBus};

    use crate::store::{InMemoryJobStore, JobStore};

    #[tokio::test]
    async fn zero_interval_is_clamped_and_still_sweeps() {
        let store = InMemoryJobStore::arc();
        let bus: Arc<InMemoryEventBus<Event>> = Arc::new(InMemoryEventBus::new());
        let mut sub = bus.subscribe();
        let ctx = StepContext::from_arc(store.clone(), Emitter::new(bus));

        let mut record = JobRecord::queued(JobId::new(), "UCabc", "a@b.com", Utc::now());
        record.updated_at = Utc::now() - chrono::Duration::hours(1);
        store.set(JOBS, &record.job_id, &record).await.unwrap();

        let handle = StallSweep::new(ctx, Duration::from_secs(60)).spawn(Duration::ZERO);
        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        handle.shutdown().await;

        assert_eq!(event.topic(), Topic::JobStalled);
        assert_eq!(event.job_id(), &record.job_id);
    }
}
