//! Schedulable descriptors: the declarative contract of one step.
//!
//! A descriptor is plain data built by explicit calls; the planner
//! never inspects implementations, only these structs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::item::{ItemId, ItemSet};
use crate::set::{DenseId, DenseSet};

/// The execution shape of a schedulable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulableKind {
    Runnable,
    Visitor,
    Adapter,
}

impl fmt::Display for SchedulableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SchedulableKind::Runnable => "runnable",
            SchedulableKind::Visitor => "visitor",
            SchedulableKind::Adapter => "adapter",
        };
        f.write_str(label)
    }
}

/// Dense identifier of a registered component filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterId(pub(crate) u32);

impl DenseId for FilterId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        FilterId(index as u32)
    }
}

/// A set of component filters.
pub type FilterSet = DenseSet<FilterId>;

/// The declared contract of one schedulable.
///
/// `needs` must hold before the step runs, `forbids` must not; after
/// the step, `adds` hold and `removes` do not. `supported_features`
/// and `required_productions` gate whether the step is eligible for a
/// given configuration at all. `cost_hint` is a relative duration
/// estimate consumed only by ordering strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub name: String,
    pub kind: SchedulableKind,
    /// Component type the step consumes.
    pub runs_on: ItemId,
    /// Component type an adapter yields; `None` for other kinds.
    pub produces_on: Option<ItemId>,
    pub needs: ItemSet,
    pub adds: ItemSet,
    pub removes: ItemSet,
    pub forbids: ItemSet,
    pub supported_features: ItemSet,
    pub required_productions: ItemSet,
    /// Applicability predicates, evaluated per concrete instance.
    pub filters: Vec<FilterId>,
    pub cost_hint: u32,
}

impl Descriptor {
    fn new(name: &str, kind: SchedulableKind, runs_on: ItemId) -> Self {
        Self {
            name: name.to_string(),
            kind,
            runs_on,
            produces_on: None,
            needs: ItemSet::new(),
            adds: ItemSet::new(),
            removes: ItemSet::new(),
            forbids: ItemSet::new(),
            supported_features: ItemSet::new(),
            required_productions: ItemSet::new(),
            filters: Vec::new(),
            cost_hint: 1,
        }
    }

    /// Start a runnable descriptor.
    pub fn runnable(name: &str, runs_on: ItemId) -> Self {
        Self::new(name, SchedulableKind::Runnable, runs_on)
    }

    /// Start a visitor descriptor.
    pub fn visitor(name: &str, runs_on: ItemId) -> Self {
        Self::new(name, SchedulableKind::Visitor, runs_on)
    }

    /// Start an adapter descriptor yielding `produces_on` instances.
    pub fn adapter(name: &str, runs_on: ItemId, produces_on: ItemId) -> Self {
        let mut d = Self::new(name, SchedulableKind::Adapter, runs_on);
        d.produces_on = Some(produces_on);
        d
    }

    pub fn needs(mut self, symbol: ItemId) -> Self {
        self.needs.insert(symbol);
        self
    }

    pub fn adds(mut self, symbol: ItemId) -> Self {
        self.adds.insert(symbol);
        self
    }

    pub fn removes(mut self, symbol: ItemId) -> Self {
        self.removes.insert(symbol);
        self
    }

    pub fn forbids(mut self, symbol: ItemId) -> Self {
        self.forbids.insert(symbol);
        self
    }

    pub fn supports(mut self, feature: ItemId) -> Self {
        self.supported_features.insert(feature);
        self
    }

    pub fn requires_production(mut self, production: ItemId) -> Self {
        self.required_productions.insert(production);
        self
    }

    pub fn filter(mut self, filter: FilterId) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn cost_hint(mut self, hint: u32) -> Self {
        self.cost_hint = hint;
        self
    }

    /// True for adapter descriptors.
    pub fn is_adapter(&self) -> bool {
        self.kind == SchedulableKind::Adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_contract() {
        let ty = ItemId::from_index(0);
        let x = ItemId::from_index(1);
        let y = ItemId::from_index(2);

        let d = Descriptor::runnable("shrink", ty)
            .needs(x)
            .adds(y)
            .forbids(ItemId::from_index(3))
            .cost_hint(4);

        assert_eq!(d.kind, SchedulableKind::Runnable);
        assert!(d.needs.contains(x));
        assert!(d.adds.contains(y));
        assert_eq!(d.cost_hint, 4);
        assert!(d.produces_on.is_none());
    }

    #[test]
    fn adapter_declares_produced_granularity() {
        let program = ItemId::from_index(0);
        let typ = ItemId::from_index(1);
        let d = Descriptor::adapter("each-type", program, typ);
        assert!(d.is_adapter());
        assert_eq!(d.produces_on, Some(typ));
    }
}
