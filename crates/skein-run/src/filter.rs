//! Filter instances and the static skip analysis.
//!
//! A filter result established at one nesting level flows down the
//! branch through the accumulated [`FilterSet`]: descendants inherit
//! it as-is, and each filter is evaluated exactly once per branch, at
//! the level whose granularity matches its declared scope.
//! On top of that, construction proves some adapter steps *skippable*:
//! if every filter reachable beneath an adapter is scoped to a
//! granularity already visible on the branch, then "no gating filter
//! currently true" means no descendant runnable can possibly run, and
//! the whole sub-plan invocation is elided without visiting a single
//! leaf instance. The proof tables are built once and never mutated,
//! so concurrent branches consult them without synchronization.

use std::sync::Arc;

use skein_core::{ComponentFilter, ComponentRef, FilterId, FilterSet, ItemId};
use skein_trace::{EventId, TraceContext};

/// One instantiated filter, owned by the nesting level whose
/// granularity matches its declared scope.
pub struct FilterInstance {
    pub id: FilterId,
    pub name: String,
    pub(crate) event: EventId,
    pub(crate) filter: Arc<dyn ComponentFilter>,
}

impl FilterInstance {
    pub(crate) fn accept(&self, trace: &mut TraceContext, data: &ComponentRef) -> bool {
        let verdict = trace.scoped(self.event, |_| self.filter.accept(data.as_ref()));
        tracing::trace!(
            filter = %self.name,
            component = %data.identity(),
            verdict,
            "evaluated filter"
        );
        verdict
    }
}

/// Precomputed skip proof for one adapter step.
#[derive(Debug, Clone, Default)]
pub struct SkipEntry {
    /// True if every filter beneath the adapter is decided by the
    /// branch above it.
    pub skippable: bool,
    /// The filters gating the sub-plan; when none of them is true in
    /// the accumulated set, the adapter is skipped.
    pub gating: FilterSet,
}

impl SkipEntry {
    /// Decide whether the adapter can be elided for a branch whose
    /// accumulated filter results are `current`.
    pub fn proves_skip(&self, current: &FilterSet) -> bool {
        self.skippable && current.is_disjoint(&self.gating)
    }

    /// Recompute the proof given the component types known on the
    /// branch (`scopes` maps each filter to its declared granularity).
    ///
    /// `all_leaves_filtered` must be false if any runnable or visitor
    /// beneath the adapter declares no filter at all: such a step
    /// always runs, so no proof can elide the sub-plan.
    pub(crate) fn compute(
        required: &FilterSet,
        all_leaves_filtered: bool,
        known: &skein_core::ItemSet,
        scopes: &[ItemId],
    ) -> Self {
        let mut entry = SkipEntry {
            skippable: all_leaves_filtered,
            gating: FilterSet::new(),
        };
        if !entry.skippable {
            return entry;
        }
        for filter in required.iter() {
            if known.contains(scopes[filter_index(filter)]) {
                entry.gating.insert(filter);
            } else {
                // A filter only decidable deeper in the tree: the
                // adapter must be entered to evaluate it.
                entry.skippable = false;
                entry.gating.clear();
                break;
            }
        }
        entry
    }
}

fn filter_index(id: FilterId) -> usize {
    use skein_core::DenseId;
    id.index()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::{DenseId, ItemSet};

    fn fid(i: usize) -> FilterId {
        FilterId::from_index(i)
    }
    fn item(i: usize) -> ItemId {
        ItemId::from_index(i)
    }

    #[test]
    fn all_filters_visible_makes_adapter_skippable() {
        let required: FilterSet = [fid(0), fid(1)].into_iter().collect();
        let known: ItemSet = [item(0)].into_iter().collect();
        let scopes = vec![item(0), item(0)];

        let entry = SkipEntry::compute(&required, true, &known, &scopes);
        assert!(entry.skippable);
        assert_eq!(entry.gating, required);

        let none_true = FilterSet::new();
        assert!(entry.proves_skip(&none_true));

        let one_true: FilterSet = [fid(1)].into_iter().collect();
        assert!(!entry.proves_skip(&one_true));
    }

    #[test]
    fn deeper_scoped_filter_blocks_the_proof() {
        let required: FilterSet = [fid(0), fid(1)].into_iter().collect();
        let known: ItemSet = [item(0)].into_iter().collect();
        // Filter 1 is scoped to a granularity not yet on the branch.
        let scopes = vec![item(0), item(7)];

        let entry = SkipEntry::compute(&required, true, &known, &scopes);
        assert!(!entry.skippable);
        assert!(entry.gating.is_empty());
        assert!(!entry.proves_skip(&FilterSet::new()));
    }

    #[test]
    fn unfiltered_leaf_blocks_the_proof() {
        // A runnable without filters always runs, so the adapter above
        // it can never be elided no matter what is known.
        let required: FilterSet = [fid(0)].into_iter().collect();
        let known: ItemSet = [item(0)].into_iter().collect();
        let entry = SkipEntry::compute(&required, false, &known, &[item(0)]);
        assert!(!entry.skippable);
        assert!(!entry.proves_skip(&FilterSet::new()));
    }
}
