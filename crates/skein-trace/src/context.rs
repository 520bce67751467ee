//! Per-branch trace contexts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::tracer::{EventId, EventStats, StatId, Tracer};

struct Frame {
    event: EventId,
    start: Instant,
    /// Accumulated wall time of nested events, for self-time.
    child: Duration,
}

/// A branch-local event stack and aggregate buffer.
///
/// One context belongs to exactly one logical thread of control: the
/// executor forks a fresh context per spawned sibling branch and each
/// merges into the shared [`Tracer`] when dropped. Events nest; a
/// frame's self-time excludes its children's wall time.
pub struct TraceContext {
    tracer: Arc<Tracer>,
    frames: Vec<Frame>,
    events: HashMap<EventId, EventStats>,
    counters: HashMap<StatId, u64>,
}

impl TraceContext {
    pub(crate) fn new(tracer: Arc<Tracer>) -> Self {
        Self {
            tracer,
            frames: Vec::new(),
            events: HashMap::new(),
            counters: HashMap::new(),
        }
    }

    /// A fresh, empty context merging into the same tracer. Used for
    /// spawned sibling branches.
    pub fn fork(&self) -> TraceContext {
        TraceContext::new(Arc::clone(&self.tracer))
    }

    /// The tracer this context merges into.
    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    /// Time `body` under an open frame for `event`.
    pub fn scoped<R>(&mut self, event: EventId, body: impl FnOnce(&mut Self) -> R) -> R {
        self.open(event);
        let result = body(self);
        self.close();
        result
    }

    /// Push an open frame. Prefer [`scoped`](Self::scoped).
    pub fn open(&mut self, event: EventId) {
        self.frames.push(Frame {
            event,
            start: Instant::now(),
            child: Duration::ZERO,
        });
    }

    /// Close the innermost frame, recording its elapsed time.
    pub fn close(&mut self) {
        let frame = self
            .frames
            .pop()
            .expect("close called with no open trace frame");
        let elapsed = frame.start.elapsed();
        self.events
            .entry(frame.event)
            .or_default()
            .record(elapsed, frame.child);
        if let Some(parent) = self.frames.last_mut() {
            parent.child += elapsed;
        }
    }

    /// Add to a named counter in the local buffer.
    pub fn count(&mut self, counter: StatId, value: u64) {
        *self.counters.entry(counter).or_insert(0) += value;
    }

    /// Depth of currently open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Drop for TraceContext {
    fn drop(&mut self) {
        // Close frames left open by an unwinding branch so their time
        // is not lost.
        while !self.frames.is_empty() {
            self.close();
        }
        if !self.events.is_empty() {
            self.tracer.merge_events(&self.events);
        }
        if !self.counters.is_empty() {
            self.tracer.merge_counters(&self.counters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn nested_frames_attribute_self_time() {
        let tracer = Arc::new(Tracer::new());
        let outer = tracer.event("outer");
        let inner = tracer.event("inner");

        {
            let mut ctx = tracer.context();
            ctx.scoped(outer, |ctx| {
                thread::sleep(Duration::from_millis(5));
                ctx.scoped(inner, |_| {
                    thread::sleep(Duration::from_millis(5));
                });
            });
        }

        let snap = tracer.snapshot();
        let outer = snap.event("outer").unwrap();
        let inner = snap.event("inner").unwrap();
        assert_eq!(outer.count, 1);
        assert_eq!(inner.count, 1);
        assert!(outer.total_ns >= inner.total_ns);
        assert!(
            outer.self_ns <= outer.total_ns - inner.total_ns,
            "self time excludes the nested frame"
        );
    }

    #[test]
    fn forked_contexts_merge_counts() {
        let tracer = Arc::new(Tracer::new());
        let ev = tracer.event("step");
        let hits = tracer.counter("hits");

        let mut root = tracer.context();
        root.count(hits, 1);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mut ctx = root.fork();
                thread::spawn(move || {
                    ctx.scoped(ev, |_| {});
                    ctx.count(hits, 1);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        drop(root);

        let snap = tracer.snapshot();
        assert_eq!(snap.event("step").unwrap().count, 4);
        assert_eq!(snap.counter("hits"), 5);
    }

    #[test]
    fn drop_closes_open_frames() {
        let tracer = Arc::new(Tracer::new());
        let ev = tracer.event("interrupted");
        {
            let mut ctx = tracer.context();
            ctx.open(ev);
            assert_eq!(ctx.depth(), 1);
            // dropped without close()
        }
        assert_eq!(tracer.snapshot().event("interrupted").unwrap().count, 1);
    }
}
