//! Schedulable contracts: the traits pipeline work implements.
//!
//! Three shapes exist. A [`Runnable`] consumes one component instance
//! and may mutate it and any reachable IR. A [`Visitor`] traverses the
//! instance's substructure and queues structural edits into a
//! [`TransformSink`]; the executor applies them only after the
//! traversal returns, so walking the IR never races its own mutation.
//! An [`Adapter`] maps an instance to a lazy, one-shot sequence of
//! finer-grained instances, each of which drives an embedded sub-plan.
//!
//! Implementations must be stateless or internally synchronized: one
//! instance may be invoked concurrently for sibling sub-instances.

use std::sync::Arc;

use crate::descriptor::SchedulableKind;

/// Failure raised by a schedulable or filter implementation.
///
/// The executor wraps it in a typed process error carrying the
/// descriptor identity and the failing component's identity string.
pub type StepFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared handle to a concrete component instance.
pub type ComponentRef = Arc<dyn Component>;

/// A lazy, finite, one-shot sequence of sub-instances produced by an
/// adapter. Consumed at most once and never reused.
pub type ComponentStream = Box<dyn Iterator<Item = ComponentRef> + Send>;

/// A concrete data instance steps run on.
///
/// The engine never inspects component structure; it only threads the
/// handle through to steps and uses [`identity`](Component::identity)
/// in diagnostics and trace labels.
pub trait Component: Send + Sync {
    /// Identity string for diagnostics, e.g. a qualified type name.
    fn identity(&self) -> String;

    /// Downcast support for adapters and filters, which need the
    /// concrete type behind the handle.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// A step that consumes one component instance.
pub trait Runnable: Send + Sync {
    fn run(&self, data: &dyn Component) -> Result<(), StepFailure>;
}

/// A step that traverses a component's substructure, queuing edits.
pub trait Visitor: Send + Sync {
    fn visit(&self, data: &dyn Component, sink: &mut TransformSink) -> Result<(), StepFailure>;
}

/// A step that yields the sub-instances an embedded sub-plan runs on.
///
/// Yielded instances must not share mutable substructure with each
/// other: the executor may run them concurrently and performs no
/// synchronization on IR content.
pub trait Adapter: Send + Sync {
    fn adapt(&self, data: &ComponentRef) -> Result<ComponentStream, StepFailure>;
}

/// A pure applicability predicate over a component instance, refining
/// static symbol-based eligibility per concrete instance.
pub trait ComponentFilter: Send + Sync {
    fn accept(&self, data: &dyn Component) -> bool;
}

/// An instantiated schedulable, produced by a registered factory.
pub enum SchedulableImpl {
    Runnable(Arc<dyn Runnable>),
    Visitor(Arc<dyn Visitor>),
    Adapter(Arc<dyn Adapter>),
}

impl SchedulableImpl {
    /// The kind this instance satisfies.
    pub fn kind(&self) -> SchedulableKind {
        match self {
            SchedulableImpl::Runnable(_) => SchedulableKind::Runnable,
            SchedulableImpl::Visitor(_) => SchedulableKind::Visitor,
            SchedulableImpl::Adapter(_) => SchedulableKind::Adapter,
        }
    }
}

type Edit = Box<dyn FnOnce() -> Result<(), StepFailure> + Send>;

/// Collects structural edits during a visit, applied afterwards.
///
/// Edits run in queue order once the traversal has completed; a failed
/// visit discards the queue untouched.
#[derive(Default)]
pub struct TransformSink {
    edits: Vec<Edit>,
}

impl TransformSink {
    pub fn new() -> Self {
        Self { edits: Vec::new() }
    }

    /// Queue an edit to run after the traversal completes.
    pub fn defer<F>(&mut self, edit: F)
    where
        F: FnOnce() -> Result<(), StepFailure> + Send + 'static,
    {
        self.edits.push(Box::new(edit));
    }

    /// Number of queued edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all queued edits in order, stopping at the first failure.
    pub fn apply(self) -> Result<(), StepFailure> {
        for edit in self.edits {
            edit()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sink_applies_in_queue_order() {
        let applied = Arc::new(AtomicUsize::new(0));
        let mut sink = TransformSink::new();
        for expected in 0..4 {
            let applied = Arc::clone(&applied);
            sink.defer(move || {
                assert_eq!(applied.fetch_add(1, Ordering::SeqCst), expected);
                Ok(())
            });
        }
        assert_eq!(sink.len(), 4);
        sink.apply().unwrap();
        assert_eq!(applied.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn sink_stops_at_first_failure() {
        let applied = Arc::new(AtomicUsize::new(0));
        let mut sink = TransformSink::new();
        {
            let applied = Arc::clone(&applied);
            sink.defer(move || {
                applied.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        sink.defer(|| Err("edit refused".into()));
        {
            let applied = Arc::clone(&applied);
            sink.defer(move || {
                applied.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert!(sink.apply().is_err());
        assert_eq!(applied.load(Ordering::SeqCst), 1, "edits after the failure do not run");
    }
}
