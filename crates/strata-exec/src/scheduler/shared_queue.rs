//! Fixed pool pulling from one shared FIFO.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use strata_core::prelude::{Error, Result, SchedulerKind};

use super::{execute, join_all, spawn_worker, Scheduler, Tracker, Work};

pub struct SharedQueueScheduler {
    sender: Mutex<Option<Sender<Work>>>,
    tracker: Arc<Tracker>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl SharedQueueScheduler {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::Config("shared queue needs at least one worker".into()));
        }
        let (sender, receiver) = unbounded();
        let tracker = Arc::new(Tracker::default());
        let handles = (0..workers)
            .map(|i| {
                let receiver: Receiver<Work> = receiver.clone();
                let tracker = Arc::clone(&tracker);
                spawn_worker(format!("strata-worker-{i}"), move || {
                    // Disconnects once the scheduler drops its sender.
                    while let Ok(work) = receiver.recv() {
                        execute(work, &tracker);
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            tracker,
            workers: Mutex::new(handles),
            worker_count: workers,
        })
    }
}

impl Scheduler for SharedQueueScheduler {
    fn kind(&self) -> SchedulerKind {
        SchedulerKind::SharedQueue
    }

    fn schedule(&self, work: Work) -> Result<()> {
        self.tracker.begin()?;
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.send(work).map_err(|_| ()),
            None => Err(()),
        };
        sent.map_err(|()| {
            self.tracker.end();
            Error::Invariant("shared queue is closed".into())
        })
    }

    fn shutdown(&self) {
        self.tracker.drain_and_close();
        self.sender.lock().take();
        let workers = std::mem::take(&mut *self.workers.lock());
        join_all(workers);
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }
}
