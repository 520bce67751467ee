//! The request builder.

use std::collections::HashMap;
use std::sync::Arc;

use skein_core::{DenseSet, ItemId, ItemKind, ItemSet, Registry, SchedulableId};

use crate::builder;
use crate::error::PlanError;
use crate::plan::Plan;
use crate::strategy::{OrderingStrategy, RegistrationOrder};

/// Selects schedulables and symbol sets for one pipeline
/// configuration, then builds a [`Plan`].
///
/// Initial and target symbol sets are keyed by component type: a
/// sub-plan built for an adapter's produced granularity uses that
/// granularity's own sets, independent of its parent's.
pub struct Request {
    registry: Arc<Registry>,
    enabled: DenseSet<SchedulableId>,
    initial: HashMap<ItemId, ItemSet>,
    targets: HashMap<ItemId, ItemSet>,
    features: ItemSet,
    productions: ItemSet,
    strategy: Arc<dyn OrderingStrategy>,
}

impl Request {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            enabled: DenseSet::new(),
            initial: HashMap::new(),
            targets: HashMap::new(),
            features: ItemSet::new(),
            productions: ItemSet::new(),
            strategy: Arc::new(RegistrationOrder),
        }
    }

    /// Enable one registered schedulable by name.
    pub fn add_schedulable(&mut self, name: &str) -> Result<&mut Self, PlanError> {
        let id = self
            .registry
            .schedulable_id(name)
            .ok_or_else(|| PlanError::UnknownSchedulable(name.to_string()))?;
        self.enabled.insert(id);
        Ok(self)
    }

    /// Enable several schedulables by name.
    pub fn add_schedulables<'a, I>(&mut self, names: I) -> Result<&mut Self, PlanError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.add_schedulable(name)?;
        }
        Ok(self)
    }

    /// Declare symbols already true before step one on `granularity`.
    pub fn add_initial<I>(&mut self, granularity: ItemId, symbols: I) -> &mut Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        self.initial.entry(granularity).or_default().extend(symbols);
        self
    }

    /// Declare symbols that must hold after the last step on
    /// `granularity`.
    pub fn add_target<I>(&mut self, granularity: ItemId, symbols: I) -> &mut Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        self.targets.entry(granularity).or_default().extend(symbols);
        self
    }

    /// Activate a feature for this configuration.
    pub fn enable_feature(&mut self, feature: ItemId) -> &mut Self {
        self.features.insert(feature);
        self
    }

    /// Activate a production for this configuration.
    pub fn enable_production(&mut self, production: ItemId) -> &mut Self {
        self.productions.insert(production);
        self
    }

    /// Replace the ordering strategy (default: registration order).
    pub fn with_strategy(&mut self, strategy: Arc<dyn OrderingStrategy>) -> &mut Self {
        self.strategy = strategy;
        self
    }

    /// Build the plan rooted at `root_type`.
    pub fn build_plan(&self, root_type: ItemId) -> Result<Plan, PlanError> {
        if self.registry.item_kind(root_type) != ItemKind::ComponentType {
            return Err(PlanError::NotAComponentType(
                self.registry.item_name(root_type).to_string(),
            ));
        }
        builder::build(self, root_type)
    }

    // --- Planner-facing accessors ---

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn is_enabled(&self, id: SchedulableId) -> bool {
        self.enabled.contains(id)
    }

    pub(crate) fn initial_for(&self, granularity: ItemId) -> ItemSet {
        self.initial.get(&granularity).cloned().unwrap_or_default()
    }

    pub(crate) fn target_for(&self, granularity: ItemId) -> ItemSet {
        self.targets.get(&granularity).cloned().unwrap_or_default()
    }

    pub(crate) fn features(&self) -> &ItemSet {
        &self.features
    }

    pub(crate) fn productions(&self) -> &ItemSet {
        &self.productions
    }

    pub(crate) fn strategy(&self) -> &dyn OrderingStrategy {
        self.strategy.as_ref()
    }
}
