//! One worker per core, each owning a local queue.
//!
//! Work lands on the queue of its preferred core, or round-robin without a
//! hint. Plain core-bound workers only ever drain their own queue. With
//! stealing, an idle worker probes the other queues `steal_attempts` times
//! before parking briefly on its own; the priority variant orders every
//! queue by descending priority, FIFO within a priority.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_affinity::CoreId;
use parking_lot::{Condvar, Mutex};
use strata_core::prelude::{Error, Result, SchedulerKind};
use tracing::{trace, warn};

use super::{execute, join_all, spawn_worker, Scheduler, Tracker, Work};

const STEAL_PARK: Duration = Duration::from_millis(1);
const IDLE_PARK: Duration = Duration::from_millis(50);

struct Ranked {
    priority: i32,
    seq: u64,
    work: Work,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum Pending {
    Fifo(VecDeque<Work>),
    Priority { heap: BinaryHeap<Ranked>, seq: u64 },
}

impl Pending {
    fn push(&mut self, work: Work) {
        match self {
            Pending::Fifo(q) => q.push_back(work),
            Pending::Priority { heap, seq } => {
                *seq += 1;
                heap.push(Ranked {
                    priority: work.priority(),
                    seq: *seq,
                    work,
                });
            }
        }
    }

    fn pop(&mut self) -> Option<Work> {
        match self {
            Pending::Fifo(q) => q.pop_front(),
            Pending::Priority { heap, .. } => heap.pop().map(|r| r.work),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Pending::Fifo(q) => q.is_empty(),
            Pending::Priority { heap, .. } => heap.is_empty(),
        }
    }
}

struct LocalQueue {
    pending: Mutex<Pending>,
    available: Condvar,
}

impl LocalQueue {
    fn new(prioritized: bool) -> Self {
        let pending = if prioritized {
            Pending::Priority {
                heap: BinaryHeap::new(),
                seq: 0,
            }
        } else {
            Pending::Fifo(VecDeque::new())
        };
        Self {
            pending: Mutex::new(pending),
            available: Condvar::new(),
        }
    }

    fn push(&self, work: Work) {
        self.pending.lock().push(work);
        self.available.notify_one();
    }

    fn try_pop(&self) -> Option<Work> {
        self.pending.lock().pop()
    }
}

struct Shared {
    queues: Vec<LocalQueue>,
    tracker: Tracker,
    stealing: bool,
    steal_attempts: usize,
}

impl Shared {
    fn steal(&self, me: usize) -> Option<Work> {
        let n = self.queues.len();
        for _ in 0..self.steal_attempts.max(1) {
            for offset in 1..n {
                let victim = (me + offset) % n;
                if let Some(work) = self.queues[victim].try_pop() {
                    trace!(worker = me, victim, "stole work");
                    return Some(work);
                }
            }
            thread::yield_now();
        }
        None
    }

    fn run_worker(&self, me: usize, core: Option<CoreId>) {
        if let Some(core) = core {
            if !core_affinity::set_for_current(core) {
                let e = Error::ResourceBind(format!("could not pin worker {me} to core {}", core.id));
                warn!(error = %e, "continuing unpinned");
            }
        }
        let park = if self.stealing { STEAL_PARK } else { IDLE_PARK };
        let own = &self.queues[me];
        loop {
            if let Some(work) = own.try_pop() {
                execute(work, &self.tracker);
                continue;
            }
            if self.stealing {
                if let Some(work) = self.steal(me) {
                    execute(work, &self.tracker);
                    continue;
                }
            }
            let mut pending = own.pending.lock();
            if pending.is_empty() {
                if self.tracker.is_closed() {
                    break;
                }
                own.available.wait_for(&mut pending, park);
            }
        }
    }
}

pub struct CoreBoundScheduler {
    kind: SchedulerKind,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next: AtomicUsize,
}

impl CoreBoundScheduler {
    /// `cpus` restricts pinning to those cores; empty means every core the
    /// process may run on.
    pub fn new(
        kind: SchedulerKind,
        workers: usize,
        steal_attempts: usize,
        cpus: Vec<usize>,
    ) -> Result<Self> {
        if !kind.is_core_bound() {
            return Err(Error::Config(format!("{kind} is not a core-bound strategy")));
        }
        if workers == 0 {
            return Err(Error::Config("core-bound scheduler needs at least one worker".into()));
        }
        let prioritized = kind == SchedulerKind::WsCoreBoundPriorityQueues;
        let shared = Arc::new(Shared {
            queues: (0..workers).map(|_| LocalQueue::new(prioritized)).collect(),
            tracker: Tracker::default(),
            stealing: kind != SchedulerKind::CoreBoundQueues,
            steal_attempts,
        });

        let cores: Vec<CoreId> = if cpus.is_empty() {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            cpus.into_iter().map(|id| CoreId { id }).collect()
        };
        if cores.is_empty() {
            let e = Error::ResourceBind("no core ids available".into());
            warn!(error = %e, "core-bound workers will run unpinned");
        }

        let handles = (0..workers)
            .map(|i| {
                let shared = Arc::clone(&shared);
                let core = cores.get(i % cores.len().max(1)).copied();
                spawn_worker(format!("strata-core-{i}"), move || shared.run_worker(i, core))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            kind,
            shared,
            workers: Mutex::new(handles),
            next: AtomicUsize::new(0),
        })
    }

    fn wake_all(&self) {
        for queue in &self.shared.queues {
            let _guard = queue.pending.lock();
            queue.available.notify_all();
        }
    }
}

impl Scheduler for CoreBoundScheduler {
    fn kind(&self) -> SchedulerKind {
        self.kind
    }

    fn schedule(&self, work: Work) -> Result<()> {
        self.shared.tracker.begin()?;
        let n = self.shared.queues.len();
        let slot = match work.core() {
            Some(core) => core % n,
            None => self.next.fetch_add(1, Ordering::Relaxed) % n,
        };
        self.shared.queues[slot].push(work);
        Ok(())
    }

    fn shutdown(&self) {
        self.shared.tracker.drain_and_close();
        self.wake_all();
        let workers = std::mem::take(&mut *self.workers.lock());
        join_all(workers);
    }

    fn worker_count(&self) -> usize {
        self.shared.queues.len()
    }
}

impl Drop for CoreBoundScheduler {
    fn drop(&mut self) {
        // Workers hold only `shared`; without this they would park forever.
        self.shared.tracker.close();
        self.wake_all();
    }
}
