//! Registration-time errors.

use thiserror::Error;

use crate::descriptor::SchedulableKind;
use crate::item::ItemKind;

/// Errors raised while registering symbols, filters, or schedulables.
///
/// Contracts are validated here, once, so the planner and executor can
/// assume every descriptor they see is internally coherent.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("schedulable '{0}' is already registered")]
    DuplicateSchedulable(String),

    #[error("filter '{0}' is already registered")]
    DuplicateFilter(String),

    #[error("unknown filter id {id} referenced by schedulable '{schedulable}'")]
    UnknownFilter { schedulable: String, id: u32 },

    #[error("{context} of '{owner}': '{item}' is a {found}, expected {expected}")]
    WrongItemKind {
        owner: String,
        context: &'static str,
        item: String,
        expected: &'static str,
        found: ItemKind,
    },

    #[error("adapter '{0}' must declare the component type it produces")]
    MissingProducesOn(String),

    #[error("{kind} '{name}' must not declare a produced component type")]
    UnexpectedProducesOn { name: String, kind: SchedulableKind },

    #[error("adapter '{0}' produces the component type it runs on")]
    SelfAdapter(String),

    #[error("adapter '{0}' must not declare component filters")]
    AdapterWithFilters(String),

    #[error("schedulable '{schedulable}' both needs and forbids '{symbol}'")]
    NeedsForbidsOverlap { schedulable: String, symbol: String },

    #[error("schedulable '{schedulable}' both adds and removes '{symbol}'")]
    AddsRemovesOverlap { schedulable: String, symbol: String },
}
