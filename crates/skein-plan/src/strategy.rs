//! Pluggable ordering strategies.
//!
//! The dependency relation among steps is a partial order, so many
//! valid total orders usually exist. A strategy proposes preference
//! permutations for the planner's search to try and scores the valid
//! orders that come back; the lowest score wins. Correctness never
//! depends on the strategy: every order the planner accepts satisfies
//! all contracts.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use skein_core::SchedulableId;

/// Planner-facing view of one eligible step.
#[derive(Debug, Clone)]
pub struct CandidateStep {
    pub id: SchedulableId,
    pub name: String,
    /// Relative duration estimate from the descriptor.
    pub cost_hint: u32,
    pub is_adapter: bool,
    /// For adapters: eligible step count on the produced granularity.
    pub fanout_hint: u32,
}

impl CandidateStep {
    /// Effective weight used by position-based scoring. Adapters weigh
    /// their embedded sub-plan in, so re-entering a granularity late
    /// costs more than running cheap leaf steps late.
    pub fn weight(&self) -> u64 {
        let fanout = if self.is_adapter {
            1 + self.fanout_hint as u64
        } else {
            1
        };
        self.cost_hint as u64 * fanout
    }
}

/// Chooses among valid orderings of a granularity's steps.
pub trait OrderingStrategy: Send + Sync {
    /// Preference permutations for the planner's search to try, in
    /// order. Indices refer into `candidates`.
    fn preferences(&self, candidates: &[CandidateStep]) -> Vec<Vec<usize>>;

    /// Secondary cost of a placed order; lower is preferred. The
    /// default is position-weighted cost: placing heavy steps (or
    /// adapters with large sub-plans) early is cheaper.
    fn score(&self, order: &[usize], candidates: &[CandidateStep]) -> u64 {
        order
            .iter()
            .enumerate()
            .map(|(pos, &i)| (pos as u64 + 1) * candidates[i].weight())
            .sum()
    }
}

/// The deterministic default: stable registration order, first valid
/// order wins.
pub struct RegistrationOrder;

impl OrderingStrategy for RegistrationOrder {
    fn preferences(&self, candidates: &[CandidateStep]) -> Vec<Vec<usize>> {
        vec![(0..candidates.len()).collect()]
    }

    fn score(&self, _order: &[usize], _candidates: &[CandidateStep]) -> u64 {
        0
    }
}

/// Seeded random search over preference permutations.
///
/// Tries registration order plus `attempts` shuffles and keeps the
/// best-scoring valid order. Deterministic for a fixed seed; an
/// optimization only, never required for a valid plan to exist.
pub struct RandomSearch {
    pub attempts: usize,
    pub seed: u64,
}

impl RandomSearch {
    pub fn new(attempts: usize, seed: u64) -> Self {
        Self { attempts, seed }
    }
}

impl OrderingStrategy for RandomSearch {
    fn preferences(&self, candidates: &[CandidateStep]) -> Vec<Vec<usize>> {
        let identity: Vec<usize> = (0..candidates.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut prefs = Vec::with_capacity(self.attempts + 1);
        prefs.push(identity.clone());
        for _ in 0..self.attempts {
            let mut shuffled = identity.clone();
            shuffled.shuffle(&mut rng);
            prefs.push(shuffled);
        }
        prefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_core::DenseId;

    fn candidates(n: usize) -> Vec<CandidateStep> {
        (0..n)
            .map(|i| CandidateStep {
                id: SchedulableId::from_index(i),
                name: format!("step-{i}"),
                cost_hint: 1,
                is_adapter: false,
                fanout_hint: 0,
            })
            .collect()
    }

    #[test]
    fn registration_order_is_identity() {
        let prefs = RegistrationOrder.preferences(&candidates(4));
        assert_eq!(prefs, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn random_search_is_seed_deterministic() {
        let cands = candidates(6);
        let a = RandomSearch::new(8, 42).preferences(&cands);
        let b = RandomSearch::new(8, 42).preferences(&cands);
        assert_eq!(a, b);
        assert_eq!(a.len(), 9);
        assert_eq!(a[0], vec![0, 1, 2, 3, 4, 5], "identity tried first");
    }

    #[test]
    fn default_score_prefers_heavy_steps_early() {
        let mut cands = candidates(2);
        cands[1].cost_hint = 10;
        let search = RandomSearch::new(0, 0);
        let heavy_first = search.score(&[1, 0], &cands);
        let heavy_last = search.score(&[0, 1], &cands);
        assert!(heavy_first < heavy_last);
    }

    #[test]
    fn adapter_weight_counts_fanout() {
        let step = CandidateStep {
            id: SchedulableId::from_index(0),
            name: "each-type".to_string(),
            cost_hint: 2,
            is_adapter: true,
            fanout_hint: 3,
        };
        assert_eq!(step.weight(), 8);
    }
}
