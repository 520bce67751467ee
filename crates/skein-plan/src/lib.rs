//! Planning for the skein pass engine.
//!
//! A [`Request`] selects a subset of registered schedulables, states
//! the symbol sets already true and the sets to reach per granularity,
//! and builds a [`Plan`]: an immutable ordered sequence of steps whose
//! preconditions are all satisfied by the cumulative effects of
//! earlier steps. Adapter steps carry embedded sub-plans built by the
//! same algorithm for the granularity they produce.
//!
//! Ordering among the many valid total orders is delegated to a
//! pluggable [`OrderingStrategy`]; the default is stable registration
//! order, with an optional seeded random search that prefers cheaper
//! placements. Planning failures are always fatal and carry enough
//! context to name the unsatisfied symbol and every candidate step
//! that could have produced it.

pub mod builder;
pub mod error;
pub mod plan;
pub mod request;
pub mod strategy;

pub use error::{ExcludedCandidate, ExclusionReason, PlanError, StuckStep};
pub use plan::{Plan, PlanOutline, PlanStep, StepOutline};
pub use request::Request;
pub use strategy::{CandidateStep, OrderingStrategy, RandomSearch, RegistrationOrder};
