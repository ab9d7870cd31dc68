#![deny(unsafe_code)]
//! strata-exec: task DAG runtime, scheduler strategies and NUMA binding.
//!
//! A `Job` is a DAG of operator invocations. `Engine::submit` dispatches
//! each task once all of its dependencies have completed, on whichever of
//! the five scheduler strategies the `EngineConfig` selects. Only `numa`
//! touches the OS directly.

pub mod job;
pub mod metrics;
pub mod numa;
pub mod runtime;
pub mod scheduler;

pub use job::Job;
pub use metrics::JobMetrics;
pub use runtime::{Engine, ExecError, JobHandle, JobOutput, JobReport, TaskReport, TaskStatus};
pub use scheduler::{Scheduler, Work};
