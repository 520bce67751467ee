//! The immutable plan produced by the builder.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use skein_core::{ItemId, Registry, SchedulableId};

/// One ordered step of a plan. Adapter steps carry the embedded
/// sub-plan that runs once per yielded sub-instance.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub id: SchedulableId,
    pub sub: Option<Plan>,
}

impl PlanStep {
    pub fn is_adapter(&self) -> bool {
        self.sub.is_some()
    }
}

/// A validated, ordered, immutable sequence of steps for one
/// granularity. Cheap to clone and safe to execute repeatedly and
/// concurrently; a plan built for one configuration may be cached and
/// reused across compilations.
#[derive(Debug, Clone)]
pub struct Plan {
    run_on: ItemId,
    steps: Arc<[PlanStep]>,
}

impl Plan {
    pub(crate) fn new(run_on: ItemId, steps: Vec<PlanStep>) -> Self {
        Self {
            run_on,
            steps: steps.into(),
        }
    }

    /// The component type this plan's steps consume.
    pub fn run_on(&self) -> ItemId {
        self.run_on
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter()
    }

    /// Total step count including nested sub-plans.
    pub fn flat_len(&self) -> usize {
        self.steps
            .iter()
            .map(|s| 1 + s.sub.as_ref().map_or(0, Plan::flat_len))
            .sum()
    }

    /// A serializable outline of the plan, for logging and tooling.
    pub fn describe(&self, registry: &Registry) -> PlanOutline {
        PlanOutline {
            run_on: registry.item_name(self.run_on).to_string(),
            steps: self
                .steps
                .iter()
                .map(|step| StepOutline {
                    name: registry.descriptor(step.id).name.clone(),
                    kind: registry.descriptor(step.id).kind.to_string(),
                    sub: step.sub.as_ref().map(|p| Box::new(p.describe(registry))),
                })
                .collect(),
        }
    }
}

/// Serializable plan outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutline {
    pub run_on: String,
    pub steps: Vec<StepOutline>,
}

/// One step of a [`PlanOutline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutline {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<Box<PlanOutline>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use skein_core::{
        Adapter, Component, ComponentRef, ComponentStream, Descriptor, ItemKind, Runnable,
        SchedulableImpl, StepFailure,
    };

    use crate::Request;

    struct Nop;
    impl Runnable for Nop {
        fn run(&self, _data: &dyn Component) -> Result<(), StepFailure> {
            Ok(())
        }
    }

    struct Barren;
    impl Adapter for Barren {
        fn adapt(&self, _data: &ComponentRef) -> Result<ComponentStream, StepFailure> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    fn nop() -> SchedulableImpl {
        SchedulableImpl::Runnable(Arc::new(Nop))
    }

    #[test]
    fn outline_serializes_the_nested_plan() {
        let mut reg = skein_core::Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        let unit = reg.item("unit", ItemKind::ComponentType);
        reg.register(Descriptor::runnable("warm-up", session), nop)
            .unwrap();
        reg.register(Descriptor::adapter("each-unit", session, unit), || {
            SchedulableImpl::Adapter(Arc::new(Barren))
        })
        .unwrap();
        reg.register(Descriptor::runnable("lower", unit), nop)
            .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request
            .add_schedulables(["warm-up", "each-unit", "lower"])
            .unwrap();
        let plan = request.build_plan(session).unwrap();

        let outline = plan.describe(&registry);
        let json = serde_json::to_value(&outline).unwrap();
        assert_eq!(json["run_on"], "session");
        assert_eq!(json["steps"][0]["name"], "warm-up");
        assert_eq!(json["steps"][0]["kind"], "runnable");
        // Leaf steps omit the "sub" key entirely.
        assert!(json["steps"][0].get("sub").is_none());
        assert_eq!(json["steps"][1]["kind"], "adapter");
        assert_eq!(json["steps"][1]["sub"]["run_on"], "unit");
        assert_eq!(json["steps"][1]["sub"]["steps"][0]["name"], "lower");

        let back: PlanOutline =
            serde_json::from_str(&serde_json::to_string(&outline).unwrap()).unwrap();
        assert_eq!(back, outline);
    }
}
