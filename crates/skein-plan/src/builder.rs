//! The plan builder.
//!
//! Models each eligible step as a node whose precondition is its
//! `needs`/`forbids` sets and whose effect is `removes` then `adds`
//! applied to a running symbol state. Placement is a depth-first
//! search: at every prefix the unplaced steps are tried in the
//! strategy's preference order, and a dead end unwinds to the last
//! choice point, so a placeable-but-premature step gets deferred
//! rather than dooming the order. A visited set over
//! (placed steps, symbol state) prunes re-exploration. Every order
//! accepted this way satisfies the prefix invariant by construction;
//! the strategy only decides *which* valid order to prefer.

use std::collections::HashSet;

use skein_core::{DenseId, Descriptor, ItemId, ItemSet, SchedulableId};

use crate::error::{ExcludedCandidate, ExclusionReason, PlanError, StuckStep};
use crate::plan::{Plan, PlanStep};
use crate::request::Request;
use crate::strategy::CandidateStep;

pub(crate) fn build(req: &Request, root: ItemId) -> Result<Plan, PlanError> {
    let mut path = Vec::new();
    build_for(req, root, &mut path)
}

fn build_for(req: &Request, granularity: ItemId, path: &mut Vec<ItemId>) -> Result<Plan, PlanError> {
    let registry = req.registry();

    let candidates: Vec<(SchedulableId, &Descriptor)> = registry
        .descriptors()
        .filter(|(id, d)| d.runs_on == granularity && req.is_enabled(*id) && is_active(req, d))
        .collect();
    let descriptors: Vec<&Descriptor> = candidates.iter().map(|(_, d)| *d).collect();

    let metas: Vec<CandidateStep> = candidates
        .iter()
        .map(|(id, d)| CandidateStep {
            id: *id,
            name: d.name.clone(),
            cost_hint: d.cost_hint,
            is_adapter: d.is_adapter(),
            fanout_hint: d
                .produces_on
                .map_or(0, |produced| eligible_count(req, produced)),
        })
        .collect();

    let initial = req.initial_for(granularity);
    let strategy = req.strategy();

    let mut best: Option<(Vec<usize>, ItemSet, u64)> = None;
    let mut first_failure: Option<Vec<(usize, ItemSet, ItemSet)>> = None;
    for preference in strategy.preferences(&metas) {
        if !is_permutation(&preference, descriptors.len()) {
            continue;
        }
        match place_steps(&descriptors, &preference, &initial) {
            Ok((order, state)) => {
                let score = strategy.score(&order, &metas);
                if best.as_ref().map_or(true, |(_, _, s)| score < *s) {
                    best = Some((order, state, score));
                }
            }
            Err(stuck) => {
                first_failure.get_or_insert(stuck);
            }
        }
    }

    let (order, state, _) = match best {
        Some(found) => found,
        None => {
            let stuck = first_failure.unwrap_or_default();
            return Err(unsatisfiable_error(req, granularity, &descriptors, stuck));
        }
    };

    // Every target symbol must survive to the end of the order.
    let target = req.target_for(granularity);
    if let Some(symbol) = target.iter().find(|s| !state.contains(*s)) {
        return Err(unreachable_error(req, granularity, symbol, &candidates, &order));
    }

    let mut steps = Vec::with_capacity(order.len());
    for idx in order {
        let (id, descriptor) = candidates[idx];
        let sub = match descriptor.produces_on {
            Some(produced) => {
                if path.contains(&produced) || produced == granularity {
                    return Err(PlanError::AdapterCycle(
                        registry.item_name(produced).to_string(),
                    ));
                }
                path.push(granularity);
                let sub = build_for(req, produced, path)?;
                path.pop();
                Some(sub)
            }
            None => None,
        };
        steps.push(PlanStep { id, sub });
    }

    tracing::debug!(
        granularity = registry.item_name(granularity),
        steps = steps.len(),
        "planned granularity"
    );

    Ok(Plan::new(granularity, steps))
}

/// Active for this configuration: all supported features and required
/// productions enabled.
fn is_active(req: &Request, d: &Descriptor) -> bool {
    req.features().is_superset(&d.supported_features)
        && req.productions().is_superset(&d.required_productions)
}

fn eligible_count(req: &Request, granularity: ItemId) -> u32 {
    req.registry()
        .descriptors()
        .filter(|(id, d)| d.runs_on == granularity && req.is_enabled(*id) && is_active(req, d))
        .count() as u32
}

fn is_permutation(preference: &[usize], len: usize) -> bool {
    if preference.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in preference {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

/// Exhaustive placement via backtracking. Returns the first complete
/// order found (candidates tried in preference order at every choice
/// point), or the stuck set of the deepest dead end reached: each
/// unplaced step with its missing needs and colliding forbids there.
#[allow(clippy::type_complexity)]
fn place_steps(
    descriptors: &[&Descriptor],
    preference: &[usize],
    initial: &ItemSet,
) -> Result<(Vec<usize>, ItemSet), Vec<(usize, ItemSet, ItemSet)>> {
    let mut search = PlaceSearch {
        descriptors,
        preference,
        placed: Vec::with_capacity(descriptors.len()),
        used: vec![false; descriptors.len()],
        seen: HashSet::new(),
        stuck: None,
    };
    let mut state = initial.clone();
    if search.descend(&mut state) {
        Ok((search.placed, state))
    } else {
        Err(search.stuck.map(|(_, rows)| rows).unwrap_or_default())
    }
}

struct PlaceSearch<'a> {
    descriptors: &'a [&'a Descriptor],
    preference: &'a [usize],
    placed: Vec<usize>,
    used: Vec<bool>,
    /// Prefixes already explored, keyed by (placed set, symbol state);
    /// the state is part of the key because removes make it depend on
    /// placement order, not just on the placed set.
    seen: HashSet<(Vec<bool>, Vec<usize>)>,
    /// Deepest dead end so far, for diagnostics.
    stuck: Option<(usize, Vec<(usize, ItemSet, ItemSet)>)>,
}

impl PlaceSearch<'_> {
    fn descend(&mut self, state: &mut ItemSet) -> bool {
        if self.placed.len() == self.descriptors.len() {
            return true;
        }
        let key = (
            self.used.clone(),
            state.iter().map(|s| s.index()).collect::<Vec<_>>(),
        );
        if !self.seen.insert(key) {
            return false;
        }

        let mut placeable = false;
        for &idx in self.preference {
            if self.used[idx] {
                continue;
            }
            let d = self.descriptors[idx];
            if !state.is_superset(&d.needs) || !state.is_disjoint(&d.forbids) {
                continue;
            }
            placeable = true;

            let before = state.clone();
            state.subtract(&d.removes);
            state.union_with(&d.adds);
            self.used[idx] = true;
            self.placed.push(idx);

            if self.descend(state) {
                return true;
            }

            self.placed.pop();
            self.used[idx] = false;
            *state = before;
        }

        if !placeable && self.stuck.as_ref().map_or(true, |(depth, _)| self.placed.len() > *depth) {
            let rows = self
                .preference
                .iter()
                .filter(|&&idx| !self.used[idx])
                .map(|&idx| {
                    let d = self.descriptors[idx];
                    let mut missing = d.needs.clone();
                    missing.subtract(state);
                    let mut colliding = d.forbids.clone();
                    colliding.intersect_with(state);
                    (idx, missing, colliding)
                })
                .collect();
            self.stuck = Some((self.placed.len(), rows));
        }
        false
    }
}

fn unsatisfiable_error(
    req: &Request,
    granularity: ItemId,
    descriptors: &[&Descriptor],
    stuck: Vec<(usize, ItemSet, ItemSet)>,
) -> PlanError {
    let registry = req.registry();
    let rows: Vec<StuckStep> = stuck
        .iter()
        .map(|(idx, missing, colliding)| StuckStep {
            step: descriptors[*idx].name.clone(),
            missing: registry.names(missing),
            colliding: registry.names(colliding),
        })
        .collect();

    let head = rows.first().cloned().unwrap_or_else(|| StuckStep {
        step: "<none>".to_string(),
        missing: Vec::new(),
        colliding: Vec::new(),
    });
    PlanError::Unsatisfiable {
        granularity: registry.item_name(granularity).to_string(),
        step: head.step,
        missing: head.missing,
        colliding: head.colliding,
        stuck: rows,
    }
}

/// Diagnose an unreached target symbol: name every registered step
/// that adds it and why that step could not help.
fn unreachable_error(
    req: &Request,
    granularity: ItemId,
    symbol: ItemId,
    placed: &[(SchedulableId, &Descriptor)],
    order: &[usize],
) -> PlanError {
    let registry = req.registry();
    let mut candidates = Vec::new();

    for (id, d) in registry.descriptors() {
        if !d.adds.contains(symbol) {
            continue;
        }
        let reason = if !req.is_enabled(id) {
            ExclusionReason::NotRequested
        } else if let Some(feature) = d
            .supported_features
            .iter()
            .find(|f| !req.features().contains(*f))
        {
            ExclusionReason::MissingFeature(registry.item_name(feature).to_string())
        } else if let Some(production) = d
            .required_productions
            .iter()
            .find(|p| !req.productions().contains(*p))
        {
            ExclusionReason::MissingProduction(registry.item_name(production).to_string())
        } else if d.runs_on != granularity {
            ExclusionReason::DifferentGranularity(registry.item_name(d.runs_on).to_string())
        } else if let Some(position) = order
            .iter()
            .position(|&idx| placed[idx].0 == id)
        {
            order[position + 1..]
                .iter()
                .map(|&idx| placed[idx].1)
                .find(|later| later.removes.contains(symbol))
                .map_or(ExclusionReason::Unplaceable, |later| {
                    ExclusionReason::RemovedBy(later.name.clone())
                })
        } else {
            ExclusionReason::Unplaceable
        };
        candidates.push(ExcludedCandidate {
            step: d.name.clone(),
            reason,
        });
    }

    PlanError::TargetUnreachable {
        granularity: registry.item_name(granularity).to_string(),
        symbol: registry.item_name(symbol).to_string(),
        candidates,
    }
}
