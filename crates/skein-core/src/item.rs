//! Capability symbols.
//!
//! A symbol is a named fact used in schedulable contracts. Five kinds
//! exist: tags (boolean pipeline facts), markers (per-node data whose
//! existence is a fact), component types (granularities steps run on),
//! features (configuration-gated capabilities), and productions (named
//! deliverables). Symbols are interned by the registry into dense
//! [`ItemId`]s; uniqueness is by name *within* a kind, so "shrink" may
//! name both a tag and a feature without collision.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::set::{DenseId, DenseSet};

/// The kind of a capability symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// A boolean fact about the pipeline state.
    Tag,
    /// Data attached to an individual IR node; its existence is a fact.
    Marker,
    /// A granularity a step runs on (whole program, type, method, ...).
    ComponentType,
    /// An optional, configuration-controlled capability.
    Feature,
    /// A named deliverable a step produces.
    Production,
}

impl ItemKind {
    /// True for the kinds allowed in needs/adds/removes/forbids sets.
    pub fn is_state_symbol(self) -> bool {
        matches!(self, ItemKind::Tag | ItemKind::Marker | ItemKind::ComponentType)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemKind::Tag => "tag",
            ItemKind::Marker => "marker",
            ItemKind::ComponentType => "component type",
            ItemKind::Feature => "feature",
            ItemKind::Production => "production",
        };
        f.write_str(label)
    }
}

/// Dense identifier of an interned capability symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub(crate) u32);

impl DenseId for ItemId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        ItemId(index as u32)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Name and kind of an interned symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub name: String,
    pub kind: ItemKind,
}

/// A set of capability symbols.
pub type ItemSet = DenseSet<ItemId>;
