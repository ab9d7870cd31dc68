//! Pluggable placement strategies for ready work.
//!
//! Every strategy gives the same guarantees: each scheduled `Work` runs
//! exactly once, and `shutdown` returns only after everything scheduled so
//! far (including work scheduled by running work) has finished. They differ
//! only in which thread runs what.

mod core_bound;
mod shared_queue;
mod thread_per_task;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use strata_core::prelude::{EngineConfig, Error, Result, SchedulerKind};
use tracing::{debug, warn};

pub use core_bound::CoreBoundScheduler;
pub use shared_queue::SharedQueueScheduler;
pub use thread_per_task::ThreadPerTaskScheduler;

/// One schedulable closure with its placement hints.
pub struct Work {
    priority: i32,
    core: Option<usize>,
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl Work {
    pub fn new(job: impl FnOnce() + Send + 'static) -> Self {
        Self {
            priority: 0,
            core: None,
            job: Box::new(job),
        }
    }

    /// Higher runs first under the priority strategy.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Preferred worker queue for core-bound strategies.
    pub fn on_core(mut self, core: Option<usize>) -> Self {
        self.core = core;
        self
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn core(&self) -> Option<usize> {
        self.core
    }

    pub fn run(self) {
        (self.job)()
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("priority", &self.priority)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

pub trait Scheduler: Send + Sync {
    fn kind(&self) -> SchedulerKind;

    /// Queue `work`. Fails once `shutdown` has begun closing the scheduler.
    fn schedule(&self, work: Work) -> Result<()>;

    /// Wait for all scheduled work to finish, then stop the workers.
    /// Idempotent.
    fn shutdown(&self);

    /// Fixed worker threads; zero for strategies that spawn on demand.
    fn worker_count(&self) -> usize;
}

/// Build the strategy `config` selects. `cpus`, when given, restricts the
/// cores core-bound workers pin themselves to.
pub fn build(config: &EngineConfig, cpus: Option<Vec<usize>>) -> Result<Arc<dyn Scheduler>> {
    config.validate()?;
    let workers = config.worker_threads;
    let scheduler: Arc<dyn Scheduler> = match config.scheduler {
        SchedulerKind::ThreadPerTask => Arc::new(ThreadPerTaskScheduler::new()),
        SchedulerKind::SharedQueue => Arc::new(SharedQueueScheduler::new(workers)?),
        kind @ (SchedulerKind::CoreBoundQueues
        | SchedulerKind::WsCoreBoundQueues
        | SchedulerKind::WsCoreBoundPriorityQueues) => Arc::new(CoreBoundScheduler::new(
            kind,
            workers,
            config.steal_attempts,
            cpus.unwrap_or_default(),
        )?),
    };
    debug!(
        scheduler = %config.scheduler,
        workers = scheduler.worker_count(),
        "scheduler started"
    );
    Ok(scheduler)
}

#[derive(Debug, Default)]
struct Gate {
    in_flight: usize,
    closed: bool,
}

/// Counts scheduled-but-unfinished work so shutdown can drain it.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    gate: Mutex<Gate>,
    idle: Condvar,
}

impl Tracker {
    pub(crate) fn begin(&self) -> Result<()> {
        let mut gate = self.gate.lock();
        if gate.closed {
            return Err(Error::Invariant("scheduler is shut down".into()));
        }
        gate.in_flight += 1;
        Ok(())
    }

    pub(crate) fn end(&self) {
        let mut gate = self.gate.lock();
        gate.in_flight -= 1;
        if gate.in_flight == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until nothing is in flight, then refuse new work.
    pub(crate) fn drain_and_close(&self) {
        let mut gate = self.gate.lock();
        while gate.in_flight > 0 {
            self.idle.wait(&mut gate);
        }
        gate.closed = true;
    }

    /// Refuse new work without waiting.
    pub(crate) fn close(&self) {
        self.gate.lock().closed = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.gate.lock().closed
    }
}

/// Run one item and account for it; a panicking item does not take the
/// worker down with it.
pub(crate) fn execute(work: Work, tracker: &Tracker) {
    if panic::catch_unwind(AssertUnwindSafe(|| work.run())).is_err() {
        warn!("scheduled work panicked");
    }
    tracker.end();
}

pub(crate) fn spawn_worker(
    name: String,
    body: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|e| Error::Invariant(format!("failed to spawn {name}: {e}")))
}

/// Join every handle except the calling thread's own.
pub(crate) fn join_all(handles: Vec<JoinHandle<()>>) {
    let me = thread::current().id();
    for handle in handles {
        if handle.thread().id() == me {
            continue;
        }
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schedulers() -> Vec<Arc<dyn Scheduler>> {
        SchedulerKind::ALL
            .iter()
            .map(|&kind| {
                let config = EngineConfig::default()
                    .with_scheduler(kind)
                    .with_worker_threads(3);
                build(&config, None).unwrap()
            })
            .collect()
    }

    #[test]
    fn every_strategy_runs_each_item_once() {
        for scheduler in schedulers() {
            let hits = Arc::new(AtomicUsize::new(0));
            for i in 0..200 {
                let hits = Arc::clone(&hits);
                let work = Work::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                })
                .with_priority(i % 5)
                .on_core(Some(i as usize));
                scheduler.schedule(work).unwrap();
            }
            scheduler.shutdown();
            assert_eq!(hits.load(Ordering::SeqCst), 200, "{}", scheduler.kind());
        }
    }

    #[test]
    fn shutdown_drains_work_scheduled_by_work() {
        for scheduler in schedulers() {
            let hits = Arc::new(AtomicUsize::new(0));
            let inner = Arc::clone(&scheduler);
            let h = Arc::clone(&hits);
            scheduler
                .schedule(Work::new(move || {
                    for _ in 0..10 {
                        let h = Arc::clone(&h);
                        inner
                            .schedule(Work::new(move || {
                                h.fetch_add(1, Ordering::SeqCst);
                            }))
                            .unwrap();
                    }
                }))
                .unwrap();
            scheduler.shutdown();
            assert_eq!(hits.load(Ordering::SeqCst), 10, "{}", scheduler.kind());
        }
    }

    #[test]
    fn closed_scheduler_rejects_work() {
        for scheduler in schedulers() {
            scheduler.shutdown();
            scheduler.shutdown();
            assert!(scheduler.schedule(Work::new(|| {})).is_err());
        }
    }

    #[test]
    fn panicking_work_is_contained() {
        for scheduler in schedulers() {
            let hits = Arc::new(AtomicUsize::new(0));
            scheduler.schedule(Work::new(|| panic!("boom"))).unwrap();
            let h = Arc::clone(&hits);
            scheduler
                .schedule(Work::new(move || {
                    h.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
            scheduler.shutdown();
            assert_eq!(hits.load(Ordering::SeqCst), 1);
        }
    }
}
