//! The capability registry.
//!
//! Process-wide catalog of symbols, component filters, and schedulable
//! descriptors. Built once at startup with `&mut` registration calls,
//! then shared immutably (typically behind an `Arc`) for the lifetime
//! of the process. All contract validation happens here; a descriptor
//! whose needs/forbids can never be simultaneously satisfied is
//! rejected at registration, not discovered at run time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::descriptor::{Descriptor, FilterId, SchedulableKind};
use crate::error::RegistryError;
use crate::item::{ItemId, ItemInfo, ItemKind, ItemSet};
use crate::schedulable::{ComponentFilter, SchedulableImpl};
use crate::set::DenseId;

/// Dense identifier of a registered schedulable, assigned in
/// registration order. Registration order is the engine's stable
/// tie-break when several valid plan orders exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchedulableId(u32);

impl DenseId for SchedulableId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        SchedulableId(index as u32)
    }
}

type SchedulableFactory = Arc<dyn Fn() -> SchedulableImpl + Send + Sync>;
type FilterFactory = Arc<dyn Fn() -> Arc<dyn ComponentFilter> + Send + Sync>;

/// A registered component filter.
pub struct RegisteredFilter {
    pub name: String,
    /// The component type granularity the predicate is scoped to.
    pub filter_on: ItemId,
    factory: FilterFactory,
}

/// A registered schedulable: its contract plus its factory.
pub struct RegisteredSchedulable {
    pub descriptor: Descriptor,
    factory: SchedulableFactory,
}

/// The process-wide capability registry.
#[derive(Default)]
pub struct Registry {
    items: Vec<ItemInfo>,
    item_index: HashMap<(ItemKind, String), ItemId>,
    filters: Vec<RegisteredFilter>,
    filter_index: HashMap<String, FilterId>,
    schedulables: Vec<RegisteredSchedulable>,
    schedulable_index: HashMap<String, SchedulableId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Symbols ---

    /// Intern a symbol, returning its id. Re-interning the same
    /// (kind, name) pair returns the existing id.
    pub fn item(&mut self, name: &str, kind: ItemKind) -> ItemId {
        if let Some(id) = self.item_index.get(&(kind, name.to_string())) {
            return *id;
        }
        let id = ItemId::from_index(self.items.len());
        self.items.push(ItemInfo {
            name: name.to_string(),
            kind,
        });
        self.item_index.insert((kind, name.to_string()), id);
        id
    }

    /// Look up an already interned symbol.
    pub fn item_id(&self, name: &str, kind: ItemKind) -> Option<ItemId> {
        self.item_index.get(&(kind, name.to_string())).copied()
    }

    pub fn item_name(&self, id: ItemId) -> &str {
        &self.items[id.index()].name
    }

    pub fn item_kind(&self, id: ItemId) -> ItemKind {
        self.items[id.index()].kind
    }

    /// Resolve a symbol set to sorted names, for diagnostics.
    pub fn names(&self, set: &ItemSet) -> Vec<String> {
        set.iter().map(|id| self.item_name(id).to_string()).collect()
    }

    // --- Filters ---

    /// Register a component filter scoped to `filter_on`.
    pub fn register_filter<F>(
        &mut self,
        name: &str,
        filter_on: ItemId,
        factory: F,
    ) -> Result<FilterId, RegistryError>
    where
        F: Fn() -> Arc<dyn ComponentFilter> + Send + Sync + 'static,
    {
        if self.filter_index.contains_key(name) {
            return Err(RegistryError::DuplicateFilter(name.to_string()));
        }
        self.expect_kind(name, "filter scope", filter_on, ItemKind::ComponentType)?;

        let id = FilterId::from_index(self.filters.len());
        self.filters.push(RegisteredFilter {
            name: name.to_string(),
            filter_on,
            factory: Arc::new(factory),
        });
        self.filter_index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn filter(&self, id: FilterId) -> &RegisteredFilter {
        &self.filters[id.index()]
    }

    pub fn filter_id(&self, name: &str) -> Option<FilterId> {
        self.filter_index.get(name).copied()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Instantiate a registered filter.
    pub fn instantiate_filter(&self, id: FilterId) -> Arc<dyn ComponentFilter> {
        (self.filters[id.index()].factory)()
    }

    // --- Schedulables ---

    /// Register a schedulable descriptor with its factory, validating
    /// the declared contract.
    pub fn register<F>(
        &mut self,
        descriptor: Descriptor,
        factory: F,
    ) -> Result<SchedulableId, RegistryError>
    where
        F: Fn() -> SchedulableImpl + Send + Sync + 'static,
    {
        self.validate(&descriptor)?;

        let id = SchedulableId::from_index(self.schedulables.len());
        self.schedulable_index
            .insert(descriptor.name.clone(), id);
        self.schedulables.push(RegisteredSchedulable {
            descriptor,
            factory: Arc::new(factory),
        });
        Ok(id)
    }

    pub fn descriptor(&self, id: SchedulableId) -> &Descriptor {
        &self.schedulables[id.index()].descriptor
    }

    pub fn schedulable_id(&self, name: &str) -> Option<SchedulableId> {
        self.schedulable_index.get(name).copied()
    }

    /// Instantiate the schedulable behind a descriptor.
    pub fn instantiate(&self, id: SchedulableId) -> SchedulableImpl {
        (self.schedulables[id.index()].factory)()
    }

    /// All descriptors, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = (SchedulableId, &Descriptor)> {
        self.schedulables
            .iter()
            .enumerate()
            .map(|(i, s)| (SchedulableId::from_index(i), &s.descriptor))
    }

    pub fn schedulable_count(&self) -> usize {
        self.schedulables.len()
    }

    // --- Validation ---

    fn validate(&self, d: &Descriptor) -> Result<(), RegistryError> {
        if self.schedulable_index.contains_key(&d.name) {
            return Err(RegistryError::DuplicateSchedulable(d.name.clone()));
        }

        self.expect_kind(&d.name, "runs-on", d.runs_on, ItemKind::ComponentType)?;
        match (d.kind, d.produces_on) {
            (SchedulableKind::Adapter, None) => {
                return Err(RegistryError::MissingProducesOn(d.name.clone()));
            }
            (SchedulableKind::Adapter, Some(produced)) => {
                self.expect_kind(&d.name, "produces-on", produced, ItemKind::ComponentType)?;
                if produced == d.runs_on {
                    return Err(RegistryError::SelfAdapter(d.name.clone()));
                }
            }
            (kind, Some(_)) => {
                return Err(RegistryError::UnexpectedProducesOn {
                    name: d.name.clone(),
                    kind,
                });
            }
            (_, None) => {}
        }

        for (context, set) in [
            ("needs", &d.needs),
            ("adds", &d.adds),
            ("removes", &d.removes),
            ("forbids", &d.forbids),
        ] {
            for symbol in set.iter() {
                let kind = self.item_kind(symbol);
                if !kind.is_state_symbol() {
                    return Err(RegistryError::WrongItemKind {
                        owner: d.name.clone(),
                        context,
                        item: self.item_name(symbol).to_string(),
                        expected: "tag, marker, or component type",
                        found: kind,
                    });
                }
            }
        }
        for feature in d.supported_features.iter() {
            self.expect_kind(&d.name, "supported feature", feature, ItemKind::Feature)?;
        }
        for production in d.required_productions.iter() {
            self.expect_kind(
                &d.name,
                "required production",
                production,
                ItemKind::Production,
            )?;
        }

        if let Some(symbol) = d.needs.iter().find(|s| d.forbids.contains(*s)) {
            return Err(RegistryError::NeedsForbidsOverlap {
                schedulable: d.name.clone(),
                symbol: self.item_name(symbol).to_string(),
            });
        }
        if let Some(symbol) = d.adds.iter().find(|s| d.removes.contains(*s)) {
            return Err(RegistryError::AddsRemovesOverlap {
                schedulable: d.name.clone(),
                symbol: self.item_name(symbol).to_string(),
            });
        }

        if d.is_adapter() && !d.filters.is_empty() {
            return Err(RegistryError::AdapterWithFilters(d.name.clone()));
        }
        for filter in &d.filters {
            if filter.index() >= self.filters.len() {
                return Err(RegistryError::UnknownFilter {
                    schedulable: d.name.clone(),
                    id: filter.index() as u32,
                });
            }
        }

        Ok(())
    }

    fn expect_kind(
        &self,
        owner: &str,
        context: &'static str,
        item: ItemId,
        expected: ItemKind,
    ) -> Result<(), RegistryError> {
        let found = self.item_kind(item);
        if found != expected {
            return Err(RegistryError::WrongItemKind {
                owner: owner.to_string(),
                context,
                item: self.item_name(item).to_string(),
                expected: match expected {
                    ItemKind::Tag => "tag",
                    ItemKind::Marker => "marker",
                    ItemKind::ComponentType => "component type",
                    ItemKind::Feature => "feature",
                    ItemKind::Production => "production",
                },
                found,
            });
        }
        Ok(())
    }
}
