//! Tracing and statistics for plan execution.
//!
//! Each executing branch owns an explicit [`TraceContext`] — a stack of
//! open timing frames plus thread-local aggregates — passed down the
//! call chain instead of hidden thread-local state. When a context is
//! dropped, its aggregates merge into the shared [`Tracer`] under one
//! lock per event entry, so sibling branches never contend on a global
//! lock. Snapshots are read-only and deterministic (sorted by label).

pub mod context;
pub mod tracer;

pub use context::TraceContext;
pub use tracer::{
    CounterSnapshot, EventId, EventSnapshot, EventStats, StatId, TraceSnapshot, Tracer,
};
