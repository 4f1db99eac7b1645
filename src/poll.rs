//! Scheduled polling
//!
//! Each poller is an independent tokio task driven by an interval. Tasks are
//! owned by a [`PollTask`] handle and stop when the handle is dropped, so a
//! view that goes away takes its timers with it.
//!
//! Results are published through [`LatestValue`], which tags every sample
//! with the sequence number of the poll that produced it and refuses samples
//! older than the one already published.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Default refresh interval for balances, allowances, quotes and LP prices
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running poller; aborts the task on drop
#[derive(Debug)]
pub struct PollTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Take ownership of an already spawned background task
    pub fn from_handle(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        // Drop does the work
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        debug!("Stopping poller {}", self.name);
        self.handle.abort();
    }
}

/// Run `tick` immediately and then every `interval` until the handle drops.
///
/// Ticks do not overlap within one poller: a slow tick delays the next one
/// instead of piling up.
pub fn spawn_poller<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> PollTask
where
    F: FnMut(u64) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq = 0u64;
        loop {
            timer.tick().await;
            seq += 1;
            trace!("Poller {} tick #{}", name, seq);
            tick(seq).await;
        }
    });

    debug!("Started poller {} every {:?}", name, interval);
    PollTask { name, handle }
}

/// A published sample and the poll that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub seq: u64,
    pub value: T,
}

/// Last-value cell shared between a poller and its readers
#[derive(Debug)]
pub struct LatestValue<T> {
    tx: watch::Sender<Option<Sample<T>>>,
    next_seq: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> LatestValue<T> {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(None);
        Arc::new(Self { tx, next_seq: AtomicU64::new(1) })
    }

    /// Reserve a sequence number before starting a read
    pub fn begin(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish `value` unless a newer read already landed.
    ///
    /// Returns whether the value was accepted.
    pub fn publish(&self, seq: u64, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if current.as_ref().map_or(false, |s| s.seq > seq) {
                trace!("Discarding stale sample #{}", seq);
                return false;
            }
            *current = Some(Sample { seq, value });
            true
        })
    }

    /// Drop the current value, e.g. when inputs become incomplete
    pub fn clear(&self, seq: u64) {
        self.tx.send_if_modified(|current| {
            if current.as_ref().map_or(false, |s| s.seq > seq) {
                return false;
            }
            let changed = current.is_some();
            *current = None;
            changed
        });
    }

    pub fn get(&self) -> Option<T> {
        self.tx.borrow().as_ref().map(|s| s.value.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Sample<T>>> {
        self.tx.subscribe()
    }
}
