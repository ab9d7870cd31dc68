//! One fresh OS thread per work item.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use strata_core::prelude::{Result, SchedulerKind};

use super::{execute, join_all, spawn_worker, Scheduler, Tracker, Work};

#[derive(Debug, Default)]
pub struct ThreadPerTaskScheduler {
    tracker: Arc<Tracker>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicU64,
}

impl ThreadPerTaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for ThreadPerTaskScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::ThreadPerTask
    }

    fn schedule(&self, work: Work) -> Result<()> {
        self.tracker.begin()?;
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let tracker = Arc::clone(&self.tracker);
        let spawned = spawn_worker(format!("strata-task-{n}"), move || {
            execute(work, &tracker)
        });
        match spawned {
            Ok(handle) => {
                let mut threads = self.threads.lock();
                threads.retain(|h| !h.is_finished());
                threads.push(handle);
                Ok(())
            }
            Err(e) => {
                self.tracker.end();
                Err(e)
            }
        }
    }

    fn shutdown(&self) {
        self.tracker.drain_and_close();
        let threads = std::mem::take(&mut *self.threads.lock());
        join_all(threads);
    }

    fn worker_count(&self) -> usize {
        0
    }
}
