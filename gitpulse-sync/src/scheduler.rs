//! Timer-driven flush scheduling.
//!
//! At most one flush is in flight at a time; a timer firing mid-flush sets
//! a pending flag that triggers exactly one follow-up attempt after a short
//! fixed delay, decoupling retries from the timer cadence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use gitpulse_core::{ChangeLedger, CommitId, MessageComposer, Result, SyncJob};

/// Consumer of sync jobs. The executor implements this; tests substitute
/// instrumented fakes.
#[async_trait]
pub trait Flusher: Send + Sync {
    async fn submit(&self, job: SyncJob) -> Result<CommitId>;
}

const FOLLOW_UP_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct State {
    busy: bool,
    pending: bool,
    timer: Option<JoinHandle<()>>,
}

/// Periodically drains the ledger into sync jobs.
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    ledger: Arc<ChangeLedger>,
    flusher: Arc<dyn Flusher>,
    composer: Arc<dyn MessageComposer>,
    state: Mutex<State>,
    follow_up_delay: Duration,
}

impl SyncScheduler {
    pub fn new(
        ledger: Arc<ChangeLedger>,
        flusher: Arc<dyn Flusher>,
        composer: Arc<dyn MessageComposer>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                flusher,
                composer,
                state: Mutex::new(State::default()),
                follow_up_delay: FOLLOW_UP_DELAY,
            }),
        }
    }

    /// Shorten the pending-retry delay; test hook.
    #[cfg(test)]
    fn with_follow_up_delay(mut self, delay: Duration) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("scheduler not yet shared");
        inner.follow_up_delay = delay;
        self
    }

    /// Arm the repeating timer. Restarting replaces any existing timer
    /// without touching an in-flight flush.
    pub fn start(&self, interval: Duration) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately; the
            // schedule starts one full interval out.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                Inner::try_flush(&inner);
            }
        }));
        info!(?interval, "scheduler started");
    }

    pub fn start_minutes(&self, minutes: u64) {
        self.start(Duration::from_secs(minutes.max(1) * 60));
    }

    /// Cancel the timer. An in-flight flush is allowed to finish.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(timer) = state.timer.take() {
            timer.abort();
            info!("scheduler stopped");
        }
    }

    /// Replace the timer cadence. Does not wait for or cancel an in-flight
    /// flush.
    pub fn update_frequency(&self, interval: Duration) {
        self.stop();
        self.start(interval);
    }

    pub fn update_frequency_minutes(&self, minutes: u64) {
        self.update_frequency(Duration::from_secs(minutes.max(1) * 60));
    }

    /// Force a flush attempt outside the timer cadence.
    pub fn flush_now(&self) {
        Inner::try_flush(&self.inner);
    }

    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().unwrap().busy
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().unwrap().timer.is_some()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn try_flush(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            if self.ledger.is_empty() {
                debug!("ledger empty, skipping flush");
                return;
            }
            if state.busy {
                debug!("flush already in flight, marking pending");
                state.pending = true;
                return;
            }
            state.busy = true;
        }

        let records = self.ledger.snapshot_and_clear();
        if records.is_empty() {
            // Raced with a concurrent snapshot; nothing to flush here, but
            // a pending request set in the window still gets its follow-up.
            self.release();
            return;
        }

        let message = self.composer.compose(&records);
        let job = SyncJob::new(records, message);
        info!(job = %job.id, records = job.records.len(), "flushing ledger");

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.flusher.submit(job.clone()).await;
            inner.complete(job, result);
        });
    }

    fn complete(self: &Arc<Self>, job: SyncJob, result: Result<CommitId>) {
        if let Err(e) = result {
            warn!(job = %job.id, error = %e, "flush failed, re-queueing records");
            // Re-insert before clearing busy so the records merge with
            // anything observed during the flush and ride the next cycle.
            for record in job.records {
                self.ledger.record(record);
            }
        }

        self.release();
    }

    /// Clear `busy` and consume `pending`, scheduling the delayed
    /// follow-up attempt when a flush request arrived in the meantime.
    fn release(self: &Arc<Self>) {
        let follow_up = {
            let mut state = self.state.lock().unwrap();
            state.busy = false;
            std::mem::take(&mut state.pending)
        };

        if follow_up {
            let inner = Arc::clone(self);
            let delay = self.follow_up_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                Inner::try_flush(&inner);
            });
        }
    }
}
