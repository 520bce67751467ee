//! Typed execution errors.
//!
//! Every variant carries the originating descriptor's name and the
//! failing component's identity string; the engine raises these, it
//! never prints them.

use thiserror::Error;

use skein_core::{Component, StepFailure};

/// Errors raised while compiling or executing a schedule instance.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("runner '{schedulable}' failed on '{component}'")]
    Runner {
        schedulable: String,
        component: String,
        #[source]
        cause: StepFailure,
    },

    #[error("visitor '{schedulable}' failed on '{component}'")]
    Visitor {
        schedulable: String,
        component: String,
        #[source]
        cause: StepFailure,
    },

    #[error("adapter '{schedulable}' failed on '{component}'")]
    Adapter {
        schedulable: String,
        component: String,
        #[source]
        cause: StepFailure,
    },

    #[error("cannot resolve schedulable '{schedulable}': {reason}")]
    Resolve { schedulable: String, reason: String },

    #[error("cannot build worker pool: {0}")]
    Pool(String),

    #[error("{} branch failure(s) collected during processing", .0.len())]
    Collected(Vec<ProcessError>),
}

impl ProcessError {
    pub(crate) fn runner(schedulable: &str, data: &dyn Component, cause: StepFailure) -> Self {
        ProcessError::Runner {
            schedulable: schedulable.to_string(),
            component: data.identity(),
            cause,
        }
    }

    pub(crate) fn visitor(schedulable: &str, data: &dyn Component, cause: StepFailure) -> Self {
        ProcessError::Visitor {
            schedulable: schedulable.to_string(),
            component: data.identity(),
            cause,
        }
    }

    pub(crate) fn adapter(schedulable: &str, data: &dyn Component, cause: StepFailure) -> Self {
        ProcessError::Adapter {
            schedulable: schedulable.to_string(),
            component: data.identity(),
            cause,
        }
    }

    /// The descriptor name of the failing step, if any.
    pub fn schedulable(&self) -> Option<&str> {
        match self {
            ProcessError::Runner { schedulable, .. }
            | ProcessError::Visitor { schedulable, .. }
            | ProcessError::Adapter { schedulable, .. }
            | ProcessError::Resolve { schedulable, .. } => Some(schedulable),
            _ => None,
        }
    }
}
