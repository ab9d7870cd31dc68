//! Task DAG construction.
//!
//! Dependencies may only name tasks added earlier, so every `Job` is acyclic
//! by construction. A task's inputs are its dependencies' outputs, in the
//! order the dependencies are listed.

use std::fmt;
use std::sync::Arc;

use strata_core::prelude::{Error, Result, TaskId};
use strata_operators::{Operator, OperatorDescriptor, OperatorRegistry};

#[derive(Clone)]
pub(crate) struct TaskSpec {
    pub(crate) operator: Arc<dyn Operator>,
    pub(crate) deps: Vec<TaskId>,
    pub(crate) priority: i32,
    pub(crate) core: Option<usize>,
}

#[derive(Clone, Default)]
pub struct Job {
    tasks: Vec<TaskSpec>,
}

impl Job {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, operator: impl Operator, deps: &[TaskId]) -> Result<TaskId> {
        self.add_shared(Arc::new(operator), deps)
    }

    pub fn add_shared(&mut self, operator: Arc<dyn Operator>, deps: &[TaskId]) -> Result<TaskId> {
        let id = TaskId::new(self.tasks.len() as u64);
        if let Some(bad) = deps.iter().find(|d| d.index() >= self.tasks.len()) {
            return Err(Error::plan(format!(
                "{id} ({}) depends on {bad}, which is not an earlier task",
                operator.name()
            )));
        }
        self.tasks.push(TaskSpec {
            operator,
            deps: deps.to_vec(),
            priority: 0,
            core: None,
        });
        Ok(id)
    }

    /// Instantiate `descriptor` through `registry` and add it.
    pub fn add_descriptor(
        &mut self,
        registry: &OperatorRegistry,
        descriptor: &OperatorDescriptor,
        deps: &[TaskId],
    ) -> Result<TaskId> {
        let operator = registry.make(descriptor)?;
        self.add_shared(operator, deps)
    }

    pub fn with_priority(&mut self, task: TaskId, priority: i32) -> Result<&mut Self> {
        self.spec_mut(task)?.priority = priority;
        Ok(self)
    }

    /// Preferred worker queue under core-bound strategies.
    pub fn with_core(&mut self, task: TaskId, core: usize) -> Result<&mut Self> {
        self.spec_mut(task)?.core = Some(core);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn deps(&self, task: TaskId) -> Option<&[TaskId]> {
        self.tasks.get(task.index()).map(|t| t.deps.as_slice())
    }

    pub(crate) fn into_tasks(self) -> Vec<TaskSpec> {
        self.tasks
    }

    fn spec_mut(&mut self, task: TaskId) -> Result<&mut TaskSpec> {
        let len = self.tasks.len();
        self.tasks.get_mut(task.index()).ok_or(Error::OutOfBounds {
            what: "task",
            index: task.index(),
            len,
        })
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (i, t) in self.tasks.iter().enumerate() {
            list.entry(&format_args!("{i}: {} <- {:?}", t.operator.name(), t.deps));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_operators::GetTable;

    #[test]
    fn deps_must_point_backwards() {
        let mut job = Job::new();
        let a = job.add_task(GetTable::new("a"), &[]).unwrap();
        let b = job.add_task(GetTable::new("b"), &[a]).unwrap();
        assert_eq!(job.deps(b), Some(&[a][..]));

        let err = job.add_task(GetTable::new("c"), &[TaskId::new(7)]).unwrap_err();
        assert!(matches!(err, Error::MalformedPlan(_)));
        let err = job.add_task(GetTable::new("c"), &[TaskId::new(2)]).unwrap_err();
        assert!(matches!(err, Error::MalformedPlan(_)));
        assert_eq!(job.len(), 2);
    }

    #[test]
    fn placement_hints_need_a_known_task() {
        let mut job = Job::new();
        let a = job.add_task(GetTable::new("a"), &[]).unwrap();
        job.with_priority(a, 3).unwrap().with_core(a, 1).unwrap();
        assert_eq!(job.tasks[0].priority, 3);
        assert_eq!(job.tasks[0].core, Some(1));
        assert!(job.with_core(TaskId::new(1), 0).is_err());
    }

    #[test]
    fn descriptors_go_through_the_registry() {
        let registry = OperatorRegistry::with_defaults();
        let mut job = Job::new();
        let d: OperatorDescriptor =
            serde_json::from_value(json!({ "type": "GetTable", "table": "t" })).unwrap();
        job.add_descriptor(&registry, &d, &[]).unwrap();
        let bad = OperatorDescriptor::new("Nope");
        assert!(job.add_descriptor(&registry, &bad, &[]).is_err());
        assert_eq!(job.len(), 1);
    }
}
