//! Planning errors.
//!
//! All payloads carry resolved symbol and step names so the
//! surrounding reporter can format them without registry access.

use serde::Serialize;
use thiserror::Error;

/// Why a candidate step that could have produced a target symbol was
/// not usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExclusionReason {
    /// The step was registered but not selected by the request.
    NotRequested,
    /// A supported feature of the step is not active.
    MissingFeature(String),
    /// A required production of the step is not active.
    MissingProduction(String),
    /// The step runs on a different granularity than the one planned.
    DifferentGranularity(String),
    /// The step was placed, but a later step removed the symbol again.
    RemovedBy(String),
    /// The step was eligible but no prefix could satisfy its contract.
    Unplaceable,
}

/// A candidate producer of an unreached target symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedCandidate {
    pub step: String,
    pub reason: ExclusionReason,
}

/// One step that could not be placed, with what blocked it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StuckStep {
    pub step: String,
    /// Needed symbols absent from every reachable state.
    pub missing: Vec<String>,
    /// Forbidden symbols still true.
    pub colliding: Vec<String>,
}

/// Errors raised while building a plan. Always fatal: there is
/// nothing to execute.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unknown schedulable '{0}'")]
    UnknownSchedulable(String),

    #[error("'{0}' is not a component type")]
    NotAComponentType(String),

    #[error(
        "no valid order for '{granularity}': step '{step}' cannot run \
         (missing {missing:?}, colliding {colliding:?})"
    )]
    Unsatisfiable {
        granularity: String,
        step: String,
        missing: Vec<String>,
        colliding: Vec<String>,
        /// Every step left unplaced when the planner gave up.
        stuck: Vec<StuckStep>,
    },

    #[error("target symbol '{symbol}' is unreachable for '{granularity}'")]
    TargetUnreachable {
        granularity: String,
        symbol: String,
        /// Steps that add the symbol, with why each was unusable.
        candidates: Vec<ExcludedCandidate>,
    },

    #[error("adapter chain revisits granularity '{0}'")]
    AdapterCycle(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_symbol() {
        let err = PlanError::TargetUnreachable {
            granularity: "program".to_string(),
            symbol: "three-address-form".to_string(),
            candidates: vec![ExcludedCandidate {
                step: "3ac-builder".to_string(),
                reason: ExclusionReason::NotRequested,
            }],
        };
        let text = err.to_string();
        assert!(text.contains("three-address-form"));
        assert!(text.contains("program"));
    }
}
