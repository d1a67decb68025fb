use rand::Rng;

use crate::environment::Environment;
use crate::error::RlError;
use crate::policy::Policy;

/// One simulation step: the state the action was taken in, the action, and
/// its log-probability when the policy is stochastic. The (state, action)
/// pair is kept because the tabular policy gradient needs it.
pub struct Step<S, A> {
    pub state: S,
    pub action: A,
    pub log_prob: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    /// The goal state was entered.
    Goal,
    /// The step cap was hit first. A valid outcome, not an error; the
    /// accumulated cost is used as-is downstream.
    StepCap,
}

/// One completed episode, immutable once returned.
pub struct Trajectory<S, A> {
    pub steps: Vec<Step<S, A>>,
    pub total_cost: f64,
    pub outcome: EpisodeOutcome,
}

impl<S, A> Trajectory<S, A> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of recorded log-probabilities (0 for deterministic policies).
    pub fn sum_log_probs(&self) -> f64 {
        self.steps.iter().filter_map(|s| s.log_prob).sum()
    }
}

/// Run one episode from the environment's start state until the goal is
/// reached or the step cap trips. A trajectory holds at most `step_cap + 1`
/// steps: the cap is checked after each step, so the step that crosses it is
/// still recorded.
pub fn run_episode<E, P, R>(
    env: &E,
    policy: &P,
    step_cap: usize,
    rng: &mut R,
) -> Result<Trajectory<E::State, E::Action>, RlError>
where
    E: Environment,
    P: Policy<E::State, E::Action>,
    R: Rng,
{
    let mut state = env.start_state();
    let mut steps = Vec::new();
    let mut total_cost = 0.0;

    let outcome = loop {
        let decision = policy.decide(&state, rng)?;
        let result = env.step(state, decision.action, rng);
        steps.push(Step {
            state,
            action: decision.action,
            log_prob: decision.log_prob,
        });
        total_cost += result.cost;
        if result.terminal {
            break EpisodeOutcome::Goal;
        }
        if steps.len() > step_cap {
            break EpisodeOutcome::StepCap;
        }
        state = result.next_state;
    };

    Ok(Trajectory {
        steps,
        total_cost,
        outcome,
    })
}

/// Sample `episodes` independent episode costs under a fixed policy.
pub fn sample_costs<E, P, R>(
    env: &E,
    policy: &P,
    episodes: usize,
    step_cap: usize,
    rng: &mut R,
) -> Result<Vec<f64>, RlError>
where
    E: Environment,
    P: Policy<E::State, E::Action>,
    R: Rng,
{
    let mut costs = Vec::with_capacity(episodes);
    for _ in 0..episodes {
        costs.push(run_episode(env, policy, step_cap, rng)?.total_cost);
    }
    Ok(costs)
}
