//! The shared statistics aggregate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::context::TraceContext;

/// Dense identifier of an interned event label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub(crate) u32);

/// Dense identifier of a named counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatId(pub(crate) u32);

/// Aggregated timings for one event label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    /// Completed occurrences.
    pub count: u64,
    /// Total wall time across occurrences.
    pub total: Duration,
    /// Wall time minus time spent in nested events.
    pub self_time: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl EventStats {
    pub(crate) fn record(&mut self, elapsed: Duration, child: Duration) {
        if self.count == 0 || elapsed < self.min {
            self.min = elapsed;
        }
        if elapsed > self.max {
            self.max = elapsed;
        }
        self.count += 1;
        self.total += elapsed;
        self.self_time += elapsed.saturating_sub(child);
    }

    pub(crate) fn merge(&mut self, other: &EventStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 || other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
        self.count += other.count;
        self.total += other.total;
        self.self_time += other.self_time;
    }
}

/// The shared trace aggregate for one compilation run (or several; the
/// caller decides the lifetime). Cheap to clone handles via `Arc`.
///
/// Merging takes one `parking_lot` mutex per event or counter entry,
/// never a table-wide lock on the hot path.
#[derive(Default)]
pub struct Tracer {
    event_labels: RwLock<Vec<String>>,
    event_index: RwLock<HashMap<String, EventId>>,
    events: RwLock<Vec<Arc<Mutex<EventStats>>>>,
    counter_labels: RwLock<Vec<String>>,
    counter_index: RwLock<HashMap<String, StatId>>,
    counters: RwLock<Vec<Arc<Mutex<u64>>>>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an event label. Idempotent.
    pub fn event(&self, label: &str) -> EventId {
        if let Some(id) = self.event_index.read().get(label) {
            return *id;
        }
        let mut index = self.event_index.write();
        if let Some(id) = index.get(label) {
            return *id;
        }
        let mut labels = self.event_labels.write();
        let id = EventId(labels.len() as u32);
        labels.push(label.to_string());
        self.events.write().push(Arc::new(Mutex::new(EventStats::default())));
        index.insert(label.to_string(), id);
        id
    }

    /// Intern a counter label. Idempotent.
    pub fn counter(&self, label: &str) -> StatId {
        if let Some(id) = self.counter_index.read().get(label) {
            return *id;
        }
        let mut index = self.counter_index.write();
        if let Some(id) = index.get(label) {
            return *id;
        }
        let mut labels = self.counter_labels.write();
        let id = StatId(labels.len() as u32);
        labels.push(label.to_string());
        self.counters.write().push(Arc::new(Mutex::new(0)));
        index.insert(label.to_string(), id);
        id
    }

    /// Add directly to a counter, bypassing any context.
    pub fn add(&self, counter: StatId, value: u64) {
        let cell = Arc::clone(&self.counters.read()[counter.0 as usize]);
        *cell.lock() += value;
    }

    /// Open a fresh per-branch context merging back into this tracer.
    pub fn context(self: &Arc<Self>) -> TraceContext {
        TraceContext::new(Arc::clone(self))
    }

    pub(crate) fn merge_events(&self, local: &HashMap<EventId, EventStats>) {
        let events = self.events.read();
        for (id, stats) in local {
            let entry = Arc::clone(&events[id.0 as usize]);
            entry.lock().merge(stats);
        }
    }

    pub(crate) fn merge_counters(&self, local: &HashMap<StatId, u64>) {
        let counters = self.counters.read();
        for (id, value) in local {
            let entry = Arc::clone(&counters[id.0 as usize]);
            *entry.lock() += value;
        }
    }

    /// Read-only snapshot of everything aggregated so far, sorted by
    /// label for deterministic output.
    pub fn snapshot(&self) -> TraceSnapshot {
        let labels = self.event_labels.read();
        let events = self.events.read();
        let mut event_rows: Vec<EventSnapshot> = labels
            .iter()
            .zip(events.iter())
            .map(|(label, stats)| {
                let stats = stats.lock();
                EventSnapshot {
                    label: label.clone(),
                    count: stats.count,
                    total_ns: stats.total.as_nanos() as u64,
                    self_ns: stats.self_time.as_nanos() as u64,
                    min_ns: stats.min.as_nanos() as u64,
                    max_ns: stats.max.as_nanos() as u64,
                }
            })
            .collect();
        event_rows.sort_by(|a, b| a.label.cmp(&b.label));

        let labels = self.counter_labels.read();
        let counters = self.counters.read();
        let mut counter_rows: Vec<CounterSnapshot> = labels
            .iter()
            .zip(counters.iter())
            .map(|(label, value)| CounterSnapshot {
                label: label.clone(),
                value: *value.lock(),
            })
            .collect();
        counter_rows.sort_by(|a, b| a.label.cmp(&b.label));

        TraceSnapshot {
            events: event_rows,
            counters: counter_rows,
        }
    }
}

/// Aggregated timings for one event label, exported for tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub label: String,
    pub count: u64,
    pub total_ns: u64,
    pub self_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

/// One named counter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub label: String,
    pub value: u64,
}

/// The post-run statistics query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub events: Vec<EventSnapshot>,
    pub counters: Vec<CounterSnapshot>,
}

impl TraceSnapshot {
    /// Find an event row by label.
    pub fn event(&self, label: &str) -> Option<&EventSnapshot> {
        self.events.iter().find(|e| e.label == label)
    }

    /// Find a counter value by label, defaulting to zero.
    pub fn counter(&self, label: &str) -> u64 {
        self.counters
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.value)
    }
}
