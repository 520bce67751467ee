//! Execution for the skein pass engine.
//!
//! A [`ScheduleInstance`] compiles a plan into runnable form: one
//! instantiated schedulable per step, the closure of filter instances
//! the whole plan needs, and a read-only skip table proving which
//! adapter steps can never apply beneath a branch. The same instance
//! may drive many concurrent invocations on different root data.
//!
//! Steps within one component instance execute strictly in plan order
//! on one logical thread of control; sibling sub-instances produced by
//! an adapter have no mutual ordering and fan out onto a fixed-size
//! rayon pool. The engine performs no synchronization on IR content —
//! an adapter's yielded instances must not share mutable substructure.

pub mod error;
pub mod filter;
pub mod instance;

pub use error::ProcessError;
pub use filter::{FilterInstance, SkipEntry};
pub use instance::{FailurePolicy, InstanceOptions, ScheduleInstance, WorkerMode};
