use std::collections::{HashMap, VecDeque};

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::environments::hazard_grid::{GridAction, GridState, HazardGrid};
use crate::error::RlError;
use crate::policies::deterministic::DeterministicPolicy;
use crate::risk;
use crate::simulator::sample_costs;

pub type GridPolicy = DeterministicPolicy<GridState, GridAction>;

/// Pluggable candidate enumeration strategy.
pub trait CandidateGenerator {
    fn generate(&self, env: &HazardGrid) -> Vec<GridPolicy>;
}

/// Breadth-first route candidates: the shortest route from start to goal
/// ignoring hazards ("through" route) and the shortest route that refuses to
/// enter any hazard cell ("around" route). Duplicate routes collapse to one
/// candidate; a route that does not exist is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestRouteCandidates;

impl CandidateGenerator for ShortestRouteCandidates {
    fn generate(&self, env: &HazardGrid) -> Vec<GridPolicy> {
        let through = bfs_route(env, false);
        let around = bfs_route(env, true);
        let mut candidates = Vec::new();
        if let Some(route) = &through {
            candidates.push(GridPolicy::from_route(route));
        }
        if let Some(route) = &around {
            if through.as_deref() != Some(route.as_slice()) {
                candidates.push(GridPolicy::from_route(route));
            }
        }
        candidates
    }
}

/// Caller-supplied candidate list.
pub struct FixedCandidates(pub Vec<GridPolicy>);

impl CandidateGenerator for FixedCandidates {
    fn generate(&self, _env: &HazardGrid) -> Vec<GridPolicy> {
        self.0.clone()
    }
}

/// Shortest route as (state, action) steps, breadth-first. With
/// `avoid_hazards` the search refuses to expand into hazard cells.
fn bfs_route(env: &HazardGrid, avoid_hazards: bool) -> Option<Vec<(GridState, GridAction)>> {
    let config = env.config();
    let mut prev: HashMap<GridState, (GridState, GridAction)> = HashMap::new();
    let mut queue = VecDeque::from([config.start]);
    prev.insert(config.start, (config.start, GridAction::Up)); // visited marker

    'outer: while let Some(state) = queue.pop_front() {
        for action in GridAction::ALL {
            let next = match neighbor(env, state, action) {
                Some(n) => n,
                None => continue,
            };
            if prev.contains_key(&next) {
                continue;
            }
            if avoid_hazards && config.hazards.contains(&next) {
                continue;
            }
            prev.insert(next, (state, action));
            if next == config.goal {
                break 'outer;
            }
            queue.push_back(next);
        }
    }

    if !prev.contains_key(&config.goal) {
        return None;
    }
    let mut route = Vec::new();
    let mut cursor = config.goal;
    while cursor != config.start {
        let (from, action) = prev[&cursor];
        route.push((from, action));
        cursor = from;
    }
    route.reverse();
    Some(route)
}

fn neighbor(env: &HazardGrid, state: GridState, action: GridAction) -> Option<GridState> {
    let config = env.config();
    let (nr, nc) = match action {
        GridAction::Up => (state.row.checked_sub(1)?, state.col),
        GridAction::Right => (state.row, state.col + 1),
        GridAction::Down => (state.row + 1, state.col),
        GridAction::Left => (state.row, state.col.checked_sub(1)?),
    };
    (nr < config.height && nc < config.width).then(|| GridState::new(nr, nc))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub risk_threshold: f64,
    /// Order of the mean-Lp risk statistic.
    pub p: f64,
    pub episodes_per_candidate: usize,
    pub step_cap: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 5.0,
            p: 1.0,
            episodes_per_candidate: 10_000,
            step_cap: 100,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), RlError> {
        if !(self.p >= 1.0) || !self.p.is_finite() {
            return Err(RlError::Configuration(format!(
                "risk order p must be >= 1 and finite, got {}",
                self.p
            )));
        }
        if !(self.risk_threshold >= 0.0) {
            return Err(RlError::Configuration(format!(
                "risk_threshold must be non-negative, got {}",
                self.risk_threshold
            )));
        }
        if self.episodes_per_candidate == 0 || self.step_cap == 0 {
            return Err(RlError::Configuration(
                "episodes_per_candidate and step_cap must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The selected candidate and its score. `average_return` is the negated
/// average cost. `feasible` is false when no candidate met the risk
/// threshold and the minimum-risk fallback was returned instead.
pub struct SearchOutcome {
    pub policy: GridPolicy,
    pub average_return: f64,
    pub risk: f64,
    pub feasible: bool,
}

/// Evaluate every candidate by Monte-Carlo simulation and pick the feasible
/// one with the lowest average cost.
///
/// Selection rule: among candidates with `risk <= risk_threshold`, lowest
/// average cost wins, ties broken by lower risk. If no candidate is
/// feasible, the lowest-risk candidate wins (ties broken by lower cost) and
/// the outcome is flagged infeasible.
pub fn search<G, R>(
    env: &HazardGrid,
    generator: &G,
    config: &SearchConfig,
    rng: &mut R,
) -> Result<SearchOutcome, RlError>
where
    G: CandidateGenerator,
    R: Rng,
{
    config.validate()?;
    let candidates = generator.generate(env);
    if candidates.is_empty() {
        return Err(RlError::Configuration(
            "candidate generator produced no policies".into(),
        ));
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for policy in candidates {
        let costs = sample_costs(
            env,
            &policy,
            config.episodes_per_candidate,
            config.step_cap,
            rng,
        )?;
        let summary = risk::evaluate(&costs, config.p)?;
        info!(
            "candidate over {} states: avg_cost = {:.4}, risk_{} = {:.4}",
            policy.len(),
            summary.average_cost,
            config.p,
            summary.risk
        );
        scored.push((policy, summary));
    }

    let feasible = scored
        .iter()
        .enumerate()
        .filter(|(_, (_, s))| s.risk <= config.risk_threshold)
        .min_by(|(_, (_, a)), (_, (_, b))| {
            a.average_cost
                .total_cmp(&b.average_cost)
                .then(a.risk.total_cmp(&b.risk))
        })
        .map(|(i, _)| i);

    let (index, is_feasible) = match feasible {
        Some(i) => (i, true),
        None => {
            let i = scored
                .iter()
                .enumerate()
                .min_by(|(_, (_, a)), (_, (_, b))| {
                    a.risk
                        .total_cmp(&b.risk)
                        .then(a.average_cost.total_cmp(&b.average_cost))
                })
                .map(|(i, _)| i)
                .unwrap();
            (i, false)
        }
    };

    let (policy, summary) = scored.swap_remove(index);
    Ok(SearchOutcome {
        policy,
        average_return: -summary.average_cost,
        risk: summary.risk,
        feasible: is_feasible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::hazard_grid::GridConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn bfs_finds_both_reference_routes() {
        let env = HazardGrid::new(GridConfig::default()).unwrap();
        let through = bfs_route(&env, false).unwrap();
        let around = bfs_route(&env, true).unwrap();
        // Direct column route: 4 moves through the hazard at (2,0).
        assert_eq!(through.len(), 4);
        assert!(through.iter().all(|(s, _)| s.col == 0));
        // Detour around the hazard: 6 moves, never entering (2,0).
        assert_eq!(around.len(), 6);
        let hazard = GridState::new(2, 0);
        assert!(around.iter().all(|(s, _)| *s != hazard));
    }

    #[test]
    fn generator_drops_duplicate_routes_when_no_hazard_blocks() {
        let mut config = GridConfig::default();
        config.hazards.clear();
        let env = HazardGrid::new(config).unwrap();
        let candidates = ShortestRouteCandidates.generate(&env);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn unreachable_goal_yields_no_candidates() {
        // Goal walled off by hazards makes the "around" route impossible;
        // the "through" route still exists.
        let mut config = GridConfig::default();
        config.hazards =
            [GridState::new(3, 0), GridState::new(3, 1), GridState::new(4, 1)]
                .into_iter()
                .collect();
        let env = HazardGrid::new(config).unwrap();
        assert!(bfs_route(&env, true).is_none());
        assert_eq!(ShortestRouteCandidates.generate(&env).len(), 1);
    }

    #[test]
    fn empty_candidate_set_is_a_configuration_error() {
        let env = HazardGrid::new(GridConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let result = search(
            &env,
            &FixedCandidates(Vec::new()),
            &SearchConfig::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(RlError::Configuration(_))));
    }
}
