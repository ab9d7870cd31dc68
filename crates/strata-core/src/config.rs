//! Engine configuration that downstream crates can serialize/deserialize.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scheduling strategy selected at startup. All strategies produce the same
/// results; they differ only in placement and throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerKind {
    /// One OS thread per ready task.
    #[serde(rename = "ThreadPerTaskScheduler")]
    ThreadPerTask,
    /// N workers pulling from one shared ready queue.
    #[serde(rename = "SharedQueueScheduler")]
    SharedQueue,
    /// One pinned worker per core, each with its own queue.
    #[serde(rename = "CoreBoundQueuesScheduler")]
    CoreBoundQueues,
    /// Core-bound queues; idle workers steal from other queues.
    #[serde(rename = "WSCoreBoundQueuesScheduler")]
    WsCoreBoundQueues,
    /// Work stealing over priority-ordered per-core queues.
    #[serde(rename = "WSCoreBoundPriorityQueuesScheduler")]
    WsCoreBoundPriorityQueues,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 5] = [
        SchedulerKind::ThreadPerTask,
        SchedulerKind::SharedQueue,
        SchedulerKind::CoreBoundQueues,
        SchedulerKind::WsCoreBoundQueues,
        SchedulerKind::WsCoreBoundPriorityQueues,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SchedulerKind::ThreadPerTask => "ThreadPerTaskScheduler",
            SchedulerKind::SharedQueue => "SharedQueueScheduler",
            SchedulerKind::CoreBoundQueues => "CoreBoundQueuesScheduler",
            SchedulerKind::WsCoreBoundQueues => "WSCoreBoundQueuesScheduler",
            SchedulerKind::WsCoreBoundPriorityQueues => "WSCoreBoundPriorityQueuesScheduler",
        }
    }

    /// Strategies that run one worker per core and benefit from NUMA binding.
    pub fn is_core_bound(&self) -> bool {
        matches!(
            self,
            SchedulerKind::CoreBoundQueues
                | SchedulerKind::WsCoreBoundQueues
                | SchedulerKind::WsCoreBoundPriorityQueues
        )
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedulerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SchedulerKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown scheduler '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scheduler: SchedulerKind,

    /// Worker thread count for the pooled strategies. Ignored by
    /// `ThreadPerTask`.
    pub worker_threads: usize,

    /// Bind the process to one NUMA node's cores and interleave memory on
    /// that node before spawning workers. Best effort.
    pub numa_pinning: bool,

    pub numa_node: usize,

    /// Rounds over the other queues an idle work-stealing worker makes
    /// before blocking on its own queue.
    pub steal_attempts: usize,

    /// Validate every position list when operators create views.
    pub checked_views: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::ThreadPerTask,
            worker_threads: num_cpus::get_physical().max(1),
            numa_pinning: false,
            numa_node: 0,
            steal_attempts: 2,
            checked_views: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `STRATA_SCHEDULER`: scheduler name (e.g. `WSCoreBoundQueuesScheduler`)
    /// - `STRATA_WORKER_THREADS`: worker thread count
    /// - `STRATA_NUMA_PINNING`: `1`/`true`/`on` to bind to a NUMA node
    /// - `STRATA_NUMA_NODE`: node to bind to
    /// - `STRATA_STEAL_ATTEMPTS`: steal rounds before blocking
    /// - `STRATA_CHECKED_VIEWS`: validate view position lists
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("STRATA_SCHEDULER") {
            if let Ok(v) = s.parse::<SchedulerKind>() {
                cfg.scheduler = v;
            }
        }

        if let Ok(s) = std::env::var("STRATA_WORKER_THREADS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.worker_threads = v;
            }
        }

        if let Ok(s) = std::env::var("STRATA_NUMA_PINNING") {
            if let Some(v) = parse_flag(&s) {
                cfg.numa_pinning = v;
            }
        }

        if let Ok(s) = std::env::var("STRATA_NUMA_NODE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.numa_node = v;
            }
        }

        if let Ok(s) = std::env::var("STRATA_STEAL_ATTEMPTS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.steal_attempts = v;
            }
        }

        if let Ok(s) = std::env::var("STRATA_CHECKED_VIEWS") {
            if let Some(v) = parse_flag(&s) {
                cfg.checked_views = v;
            }
        }

        cfg
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
