//! Core data model for the skein pass-scheduling engine.
//!
//! Pipeline work is decomposed into *schedulables*: units that declare,
//! as plain data, which capability symbols they need, add, remove, and
//! forbid. The planner (`skein-plan`) orders them from those contracts
//! alone; the executor (`skein-run`) runs the resulting plan against a
//! concrete IR root.
//!
//! This crate holds the leaves everything else builds on: capability
//! symbols ([`ItemId`], [`ItemKind`]) and their bitsets ([`ItemSet`]),
//! the schedulable traits ([`Runnable`], [`Visitor`], [`Adapter`]),
//! declarative [`Descriptor`]s, and the process-wide [`Registry`] that
//! validates contracts at registration time. There is no reflection:
//! every schedulable is registered with an explicit factory closure.

pub mod descriptor;
pub mod error;
pub mod item;
pub mod registry;
pub mod schedulable;
pub mod set;

pub use descriptor::{Descriptor, FilterId, FilterSet, SchedulableKind};
pub use error::RegistryError;
pub use item::{ItemId, ItemKind, ItemSet};
pub use registry::{Registry, SchedulableId};
pub use schedulable::{
    Adapter, Component, ComponentFilter, ComponentRef, ComponentStream, Runnable, SchedulableImpl,
    StepFailure, TransformSink, Visitor,
};
pub use set::{DenseId, DenseSet};
