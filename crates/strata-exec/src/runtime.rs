//! Runtime: execute task DAGs on the configured scheduler.
//!
//! Behavior:
//! - Tasks without dependencies are dispatched at submit time; every other
//!   task is dispatched by whichever worker completes its last dependency.
//! - A task's output becomes visible to its dependents under the job lock,
//!   together with the dependency countdown, so dispatch happens exactly once.
//! - A failure marks every transitive dependent as skipped
//!   (`DependencyFailure`); they never leave `Pending`. Unrelated branches
//!   keep running. The first failure is the job's error.
//! - Intermediate outputs are dropped once their last consumer has run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use strata_core::prelude::{EngineConfig, Error, JobId, SchedulerKind, TaskId};
use strata_operators::{OpContext, Operator};
use strata_storage::{Catalog, Relation, View};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::job::Job;
use crate::metrics::{self, JobMetrics};
use crate::numa;
use crate::scheduler::{self, Scheduler, Work};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("{task} ({operator}) failed: {source}")]
    Task {
        task: TaskId,
        operator: &'static str,
        source: Error,
    },

    #[error(transparent)]
    Core(#[from] Error),
}

impl ExecError {
    pub fn error(&self) -> &Error {
        match self {
            ExecError::Task { source, .. } => source,
            ExecError::Core(e) => e,
        }
    }

    pub fn task(&self) -> Option<TaskId> {
        match self {
            ExecError::Task { task, .. } => Some(*task),
            ExecError::Core(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub id: TaskId,
    pub operator: &'static str,
    pub status: TaskStatus,
    /// Terminal error, or `DependencyFailure` for a skipped task.
    pub error: Option<Error>,
    pub elapsed: Option<Duration>,
    /// Row count of the output while it was alive.
    pub rows: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: JobId,
    pub tasks: Vec<TaskReport>,
    pub first_error: Option<ExecError>,
    pub metrics: JobMetrics,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.first_error.is_none()
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskReport> {
        self.tasks.get(id.index())
    }
}

/// Outputs of the terminal tasks (those nothing depends on), by task id.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    outputs: Vec<(TaskId, Arc<View>)>,
}

impl JobOutput {
    pub fn get(&self, task: TaskId) -> Option<&Arc<View>> {
        self.outputs
            .iter()
            .find(|(id, _)| *id == task)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &Arc<View>)> {
        self.outputs.iter().map(|(id, v)| (*id, v))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

struct Node {
    operator: Arc<dyn Operator>,
    deps: Vec<TaskId>,
    dependents: Vec<TaskId>,
    priority: i32,
    core: Option<usize>,
}

struct Progress {
    status: Vec<TaskStatus>,
    waiting_on: Vec<usize>,
    consumers_left: Vec<usize>,
    outputs: Vec<Option<Arc<View>>>,
    rows: Vec<Option<usize>>,
    errors: Vec<Option<Error>>,
    elapsed: Vec<Option<Duration>>,
    first_error: Option<ExecError>,
    resolved: usize,
    metrics: JobMetrics,
}

struct JobState {
    id: JobId,
    nodes: Vec<Node>,
    catalog: Arc<Catalog>,
    checked_views: bool,
    scheduler: Arc<dyn Scheduler>,
    progress: Mutex<Progress>,
    changed: Condvar,
    started: Instant,
}

impl JobState {
    fn dispatch(self: &Arc<Self>, task: TaskId) {
        let node = &self.nodes[task.index()];
        let state = Arc::clone(self);
        let work = Work::new(move || state.run(task))
            .with_priority(node.priority)
            .on_core(node.core);
        if let Err(e) = self.scheduler.schedule(work) {
            self.finish(task, Err(e), Duration::ZERO);
        }
    }

    fn run(self: &Arc<Self>, task: TaskId) {
        let node = &self.nodes[task.index()];
        let inputs = {
            let mut p = self.progress.lock();
            p.status[task.index()] = TaskStatus::Running;
            node.deps
                .iter()
                .map(|d| {
                    p.outputs[d.index()].clone().ok_or_else(|| {
                        Error::Invariant(format!("output of {d} released before {task} ran"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let start = Instant::now();
        let result = inputs.and_then(|inputs| self.execute(node, &inputs));
        self.finish(task, result.map(Arc::new), start.elapsed());
    }

    fn execute(&self, node: &Node, inputs: &[Arc<View>]) -> Result<View, Error> {
        let ctx = OpContext::new(&self.catalog).with_checked_views(self.checked_views);
        match panic::catch_unwind(AssertUnwindSafe(|| node.operator.execute(inputs, &ctx))) {
            Ok(result) => result.map_err(Error::from),
            Err(payload) => Err(Error::Invariant(format!(
                "{} panicked: {}",
                node.operator.name(),
                panic_message(&*payload)
            ))),
        }
    }

    fn finish(self: &Arc<Self>, task: TaskId, result: Result<Arc<View>, Error>, elapsed: Duration) {
        let node = &self.nodes[task.index()];
        let ready = {
            let mut p = self.progress.lock();
            let i = task.index();
            p.elapsed[i] = Some(elapsed);
            self.release_inputs(&mut p, task);

            let mut ready = Vec::new();
            match result {
                Ok(view) => {
                    trace!(job = %self.id, %task, rows = view.row_count(), "task completed");
                    p.status[i] = TaskStatus::Completed;
                    p.rows[i] = Some(view.row_count());
                    // Consumers may all have been skipped by an earlier failure.
                    if node.dependents.is_empty() || p.consumers_left[i] > 0 {
                        p.outputs[i] = Some(view);
                    }
                    p.metrics.completed += 1;
                    p.resolved += 1;
                    for &d in &node.dependents {
                        let w = &mut p.waiting_on[d.index()];
                        *w -= 1;
                        if *w == 0 {
                            p.status[d.index()] = TaskStatus::Ready;
                            ready.push(d);
                        }
                    }
                }
                Err(error) => {
                    warn!(job = %self.id, %task, operator = node.operator.name(), %error, "task failed");
                    p.status[i] = TaskStatus::Failed;
                    p.errors[i] = Some(error.clone());
                    p.metrics.failed += 1;
                    p.resolved += 1;
                    if p.first_error.is_none() {
                        p.first_error = Some(ExecError::Task {
                            task,
                            operator: node.operator.name(),
                            source: error,
                        });
                    }
                    self.skip_dependents(&mut p, task);
                }
            }
            if p.resolved == self.nodes.len() {
                p.metrics.wall = self.started.elapsed();
                metrics::emit_job(self.id, &p.metrics);
            }
            self.changed.notify_all();
            ready
        };
        for d in ready {
            self.dispatch(d);
        }
    }

    /// Every transitive dependent of `failed` stays pending forever.
    fn skip_dependents(&self, p: &mut Progress, failed: TaskId) {
        let mut stack = self.nodes[failed.index()].dependents.clone();
        while let Some(task) = stack.pop() {
            let i = task.index();
            if p.errors[i].is_some() {
                continue;
            }
            p.errors[i] = Some(Error::DependencyFailure {
                task,
                dependency: failed,
            });
            p.metrics.skipped += 1;
            p.resolved += 1;
            self.release_inputs(p, task);
            stack.extend(self.nodes[i].dependents.iter().copied());
        }
    }

    /// `task` no longer needs its inputs; drop those with no reader left.
    fn release_inputs(&self, p: &mut Progress, task: TaskId) {
        for d in &self.nodes[task.index()].deps {
            let left = &mut p.consumers_left[d.index()];
            *left -= 1;
            if *left == 0 {
                p.outputs[d.index()] = None;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}

/// Handle to a submitted job.
pub struct JobHandle {
    state: Arc<JobState>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.state.id
    }

    /// Block until every task completed or the first failure is observed.
    pub fn wait(&self) -> Result<JobOutput, ExecError> {
        let total = self.state.nodes.len();
        let mut p = self.state.progress.lock();
        while p.first_error.is_none() && p.resolved < total {
            self.state.changed.wait(&mut p);
        }
        if let Some(e) = &p.first_error {
            return Err(e.clone());
        }
        let outputs = self
            .state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.dependents.is_empty())
            .filter_map(|(i, _)| {
                p.outputs[i]
                    .clone()
                    .map(|v| (TaskId::new(i as u64), v))
            })
            .collect();
        Ok(JobOutput { outputs })
    }

    /// Block until every task has resolved (completed, failed or skipped).
    pub fn report(&self) -> JobReport {
        let total = self.state.nodes.len();
        let mut p = self.state.progress.lock();
        while p.resolved < total {
            self.state.changed.wait(&mut p);
        }
        let tasks = self
            .state
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| TaskReport {
                id: TaskId::new(i as u64),
                operator: n.operator.name(),
                status: p.status[i],
                error: p.errors[i].clone(),
                elapsed: p.elapsed[i],
                rows: p.rows[i],
            })
            .collect();
        JobReport {
            job: self.state.id,
            tasks,
            first_error: p.first_error.clone(),
            metrics: p.metrics,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.progress.lock().resolved == self.state.nodes.len()
    }
}

/// Engine owns the catalog handle and the scheduler.
pub struct Engine {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    scheduler: Arc<dyn Scheduler>,
    next_job: AtomicU64,
    closed: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig, catalog: Arc<Catalog>) -> Result<Self, ExecError> {
        config.validate()?;
        let cpus = if config.numa_pinning {
            match numa::bind_to_node(config.numa_node) {
                Ok(cpus) => {
                    info!(node = config.numa_node, cpus = cpus.len(), "bound to NUMA node");
                    Some(cpus)
                }
                Err(e) => {
                    warn!(node = config.numa_node, error = %e, "continuing without NUMA binding");
                    None
                }
            }
        } else {
            None
        };
        let scheduler = scheduler::build(&config, cpus)?;
        info!(
            scheduler = %config.scheduler,
            workers = scheduler.worker_count(),
            "engine started"
        );
        Ok(Self {
            config,
            catalog,
            scheduler,
            next_job: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn scheduler_kind(&self) -> SchedulerKind {
        self.scheduler.kind()
    }

    pub fn worker_count(&self) -> usize {
        self.scheduler.worker_count()
    }

    pub fn submit(&self, job: Job) -> Result<JobHandle, ExecError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Invariant("engine is shut down".into()).into());
        }
        let id = JobId::new(self.next_job.fetch_add(1, Ordering::Relaxed));
        let specs = job.into_tasks();
        let n = specs.len();

        let mut nodes: Vec<Node> = specs
            .into_iter()
            .map(|s| Node {
                operator: s.operator,
                deps: s.deps,
                dependents: Vec::new(),
                priority: s.priority,
                core: s.core,
            })
            .collect();
        for i in 0..n {
            for k in 0..nodes[i].deps.len() {
                let d = nodes[i].deps[k];
                nodes[d.index()].dependents.push(TaskId::new(i as u64));
            }
        }

        let waiting_on: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();
        let roots: Vec<TaskId> = (0..n)
            .filter(|&i| waiting_on[i] == 0)
            .map(|i| TaskId::new(i as u64))
            .collect();
        let mut status = vec![TaskStatus::Pending; n];
        for r in &roots {
            status[r.index()] = TaskStatus::Ready;
        }
        let progress = Progress {
            status,
            waiting_on,
            consumers_left: nodes.iter().map(|n| n.dependents.len()).collect(),
            outputs: vec![None; n],
            rows: vec![None; n],
            errors: vec![None; n],
            elapsed: vec![None; n],
            first_error: None,
            resolved: 0,
            metrics: JobMetrics::default(),
        };

        let state = Arc::new(JobState {
            id,
            nodes,
            catalog: Arc::clone(&self.catalog),
            checked_views: self.config.checked_views,
            scheduler: Arc::clone(&self.scheduler),
            progress: Mutex::new(progress),
            changed: Condvar::new(),
            started: Instant::now(),
        });
        debug!(job = %id, tasks = n, roots = roots.len(), "job submitted");
        if n == 0 {
            metrics::emit_job(id, &JobMetrics::default());
        }
        for r in roots {
            state.dispatch(r);
        }
        Ok(JobHandle { state })
    }

    /// `submit` then `wait`.
    pub fn run(&self, job: Job) -> Result<JobOutput, ExecError> {
        self.submit(job)?.wait()
    }

    /// Finish everything in flight, then stop the workers. Idempotent.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.scheduler.shutdown();
            debug!("engine stopped");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use strata_operators::OpError;
    use strata_storage::{Column, Table};

    struct Emit(Arc<Table>);

    impl Emit {
        fn new(v: i64) -> Self {
            Self(Arc::new(
                Table::try_new(vec![Column::new("v", vec![v])]).unwrap(),
            ))
        }
    }

    impl Operator for Emit {
        fn name(&self) -> &'static str {
            "Emit"
        }
        fn arity(&self) -> usize {
            0
        }
        fn execute(&self, _: &[Arc<View>], _: &OpContext<'_>) -> Result<View, OpError> {
            Ok(View::from_table(Arc::clone(&self.0)))
        }
    }

    #[derive(Default)]
    struct Sum(Arc<AtomicUsize>);

    impl Operator for Sum {
        fn name(&self) -> &'static str {
            "Sum"
        }
        fn arity(&self) -> usize {
            2
        }
        fn execute(&self, inputs: &[Arc<View>], _: &OpContext<'_>) -> Result<View, OpError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let mut total = 0i64;
            for input in inputs {
                total += input.reader::<i64>(0)?.iter().sum::<i64>();
            }
            let t = Table::try_new(vec![Column::new("v", vec![total])])?;
            Ok(View::from_table(Arc::new(t)))
        }
    }

    struct Fail;

    impl Operator for Fail {
        fn name(&self) -> &'static str {
            "Fail"
        }
        fn arity(&self) -> usize {
            0
        }
        fn execute(&self, _: &[Arc<View>], _: &OpContext<'_>) -> Result<View, OpError> {
            Err(Error::plan("injected").into())
        }
    }

    struct Explode;

    impl Operator for Explode {
        fn name(&self) -> &'static str {
            "Explode"
        }
        fn arity(&self) -> usize {
            0
        }
        fn execute(&self, _: &[Arc<View>], _: &OpContext<'_>) -> Result<View, OpError> {
            panic!("operator blew up")
        }
    }

    fn engine(kind: SchedulerKind) -> Engine {
        let config = EngineConfig::default()
            .with_scheduler(kind)
            .with_worker_threads(3);
        Engine::new(config, Arc::new(Catalog::new())).unwrap()
    }

    fn value(v: &View) -> i64 {
        *v.value::<i64>(0, 0).unwrap()
    }

    #[test]
    fn diamond_gives_same_result_under_every_strategy() {
        for kind in SchedulerKind::ALL {
            let engine = engine(kind);
            let mut job = Job::new();
            let a = job.add_task(Emit::new(1), &[]).unwrap();
            let b = job.add_task(Emit::new(10), &[]).unwrap();
            let c = job.add_task(Sum::default(), &[a, b]).unwrap();
            let d = job.add_task(Sum::default(), &[a, c]).unwrap();
            let e = job.add_task(Sum::default(), &[c, d, c]).unwrap();
            job.with_priority(d, 5).unwrap().with_core(e, 1).unwrap();

            let out = engine.run(job).unwrap();
            assert_eq!(out.len(), 1, "{kind}");
            assert_eq!(value(out.get(e).unwrap()), 11 + 12 + 11, "{kind}");
        }
    }

    #[test]
    fn each_task_is_dispatched_once() {
        for kind in SchedulerKind::ALL {
            let engine = engine(kind);
            let hits = Arc::new(AtomicUsize::new(0));
            let mut job = Job::new();
            let mut layer: Vec<TaskId> =
                (0..8).map(|i| job.add_task(Emit::new(i), &[]).unwrap()).collect();
            let mut sums = 0;
            while layer.len() > 1 {
                layer = layer
                    .chunks(2)
                    .map(|pair| {
                        sums += 1;
                        job.add_task(Sum(Arc::clone(&hits)), pair).unwrap()
                    })
                    .collect();
            }
            let out = engine.run(job).unwrap();
            assert_eq!(value(out.get(layer[0]).unwrap()), (0..8).sum::<i64>());
            assert_eq!(hits.load(Ordering::SeqCst), sums, "{kind}");
        }
    }

    #[test]
    fn failure_skips_reachable_tasks_only() {
        for kind in SchedulerKind::ALL {
            let engine = engine(kind);
            let mut job = Job::new();
            let a = job.add_task(Emit::new(1), &[]).unwrap();
            let bad = job.add_task(Fail, &[]).unwrap();
            let c = job.add_task(Sum::default(), &[a, bad]).unwrap();
            let d = job.add_task(Sum::default(), &[c]).unwrap();
            let e = job.add_task(Sum::default(), &[a]).unwrap();

            let handle = engine.submit(job).unwrap();
            let err = handle.wait().unwrap_err();
            assert_eq!(err.task(), Some(bad));
            assert_eq!(err.error(), &Error::plan("injected"));

            let report = handle.report();
            assert!(!report.is_success());
            assert_eq!(report.task(bad).unwrap().status, TaskStatus::Failed);
            for skipped in [c, d] {
                let t = report.task(skipped).unwrap();
                assert_eq!(t.status, TaskStatus::Pending, "{kind}");
                assert!(t.error.as_ref().unwrap().is_dependency_failure());
            }
            assert_eq!(report.task(e).unwrap().status, TaskStatus::Completed);
            assert_eq!(report.task(e).unwrap().rows, Some(1));
            assert_eq!(
                (report.metrics.completed, report.metrics.failed, report.metrics.skipped),
                (2, 1, 2)
            );
        }
    }

    #[test]
    fn operator_panic_fails_the_task() {
        let engine = engine(SchedulerKind::SharedQueue);
        let mut job = Job::new();
        let t = job.add_task(Explode, &[]).unwrap();
        let err = engine.run(job).unwrap_err();
        assert_eq!(err.task(), Some(t));
        assert!(matches!(err.error(), Error::Invariant(m) if m.contains("blew up")));
    }

    #[test]
    fn intermediate_outputs_are_released() {
        let engine = engine(SchedulerKind::WsCoreBoundQueues);
        let source = Emit::new(4);
        let table = Arc::clone(&source.0);
        let mut job = Job::new();
        let a = job.add_task(source, &[]).unwrap();
        let b = job.add_task(Sum::default(), &[a]).unwrap();
        let handle = engine.submit(job).unwrap();
        let out = handle.wait().unwrap();
        assert_eq!(value(out.get(b).unwrap()), 4);
        assert!(out.get(a).is_none());
        // The job still holds the operator; the view over the table is gone.
        assert_eq!(Arc::strong_count(&table), 2);
    }

    #[test]
    fn failed_numa_bind_is_not_fatal() {
        for kind in SchedulerKind::ALL {
            let mut config = EngineConfig::default()
                .with_scheduler(kind)
                .with_worker_threads(2);
            config.numa_pinning = true;
            config.numa_node = 100_000;
            let engine = Engine::new(config, Arc::new(Catalog::new())).unwrap();
            assert_eq!(engine.scheduler_kind(), kind);

            let mut job = Job::new();
            let a = job.add_task(Emit::new(2), &[]).unwrap();
            let b = job.add_task(Emit::new(5), &[]).unwrap();
            let c = job.add_task(Sum::default(), &[a, b]).unwrap();
            let out = engine.run(job).unwrap();
            assert_eq!(value(out.get(c).unwrap()), 7, "{kind}");
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_job_still_reports_metrics() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let engine = engine(SchedulerKind::SharedQueue);
        let handle = tracing::subscriber::with_default(subscriber, || {
            engine.submit(Job::new()).unwrap()
        });
        assert!(handle.is_finished());
        let log = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(log.contains("job finished"), "{log}");
        assert!(log.contains("completed=0"), "{log}");
    }

    #[test]
    fn empty_job_and_shutdown() {
        let engine = engine(SchedulerKind::ThreadPerTask);
        let handle = engine.submit(Job::new()).unwrap();
        assert!(handle.is_finished());
        assert!(handle.wait().unwrap().is_empty());
        engine.shutdown();
        engine.shutdown();
        assert!(engine.submit(Job::new()).is_err());
    }
}
