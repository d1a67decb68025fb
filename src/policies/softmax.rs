use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::environments::hazard_grid::{GridAction, GridState};
use crate::error::RlError;
use crate::policy::{Decision, Policy};

/// Guard inside the log, matching the sampling convention of the learner.
const LOG_EPS: f64 = 1e-8;

/// Tabular stochastic policy: one length-4 logit vector per grid cell,
/// row-major. Zero-initialized, i.e. uniform over actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxPolicy {
    logits: Vec<[f64; GridAction::COUNT]>,
    width: usize,
}

impl SoftmaxPolicy {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            logits: vec![[0.0; GridAction::COUNT]; height * width],
            width,
        }
    }

    pub fn state_index(&self, state: GridState) -> usize {
        state.row * self.width + state.col
    }

    /// Action distribution at `state` (max-subtracted softmax).
    pub fn probs(&self, state: GridState) -> [f64; GridAction::COUNT] {
        let logits = &self.logits[self.state_index(state)];
        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut probs = [0.0; GridAction::COUNT];
        let mut sum = 0.0;
        for (p, &l) in probs.iter_mut().zip(logits.iter()) {
            *p = (l - max).exp();
            sum += *p;
        }
        for p in &mut probs {
            *p /= sum;
        }
        probs
    }

    /// Highest-probability action, for querying a trained policy.
    pub fn greedy_action(&self, state: GridState) -> GridAction {
        let probs = self.probs(state);
        let mut best = 0;
        for a in 1..GridAction::COUNT {
            if probs[a] > probs[best] {
                best = a;
            }
        }
        GridAction::ALL[best]
    }

    pub fn logits(&self) -> &[[f64; GridAction::COUNT]] {
        &self.logits
    }

    pub(crate) fn take_logits(&mut self) -> Vec<[f64; GridAction::COUNT]> {
        std::mem::take(&mut self.logits)
    }

    pub(crate) fn set_logits(&mut self, logits: Vec<[f64; GridAction::COUNT]>) {
        self.logits = logits;
    }
}

impl Policy<GridState, GridAction> for SoftmaxPolicy {
    fn decide<R: Rng>(&self, state: &GridState, rng: &mut R) -> Result<Decision<GridAction>, RlError> {
        let probs = self.probs(*state);
        // Inverse-CDF sample on a single uniform draw.
        let u = rng.random::<f64>();
        let mut acc = 0.0;
        let mut chosen = GridAction::COUNT - 1;
        for (a, &p) in probs.iter().enumerate() {
            acc += p;
            if u < acc {
                chosen = a;
                break;
            }
        }
        Ok(Decision {
            action: GridAction::ALL[chosen],
            log_prob: Some((probs[chosen] + LOG_EPS).ln()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fresh_policy_is_uniform() {
        let policy = SoftmaxPolicy::new(5, 5);
        let probs = policy.probs(GridState::new(2, 3));
        for p in probs {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn sampled_log_prob_matches_distribution() {
        let mut policy = SoftmaxPolicy::new(2, 2);
        let mut logits = policy.take_logits();
        logits[0] = [2.0, 0.0, -1.0, 0.5];
        policy.set_logits(logits);

        let state = GridState::new(0, 0);
        let probs = policy.probs(state);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let d = policy.decide(&state, &mut rng).unwrap();
            let expected = (probs[d.action.index()] + 1e-8).ln();
            assert!((d.log_prob.unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn skewed_logits_dominate_sampling() {
        let mut policy = SoftmaxPolicy::new(1, 1);
        let mut logits = policy.take_logits();
        logits[0] = [0.0, 20.0, 0.0, 0.0];
        policy.set_logits(logits);

        let state = GridState::new(0, 0);
        assert_eq!(policy.greedy_action(state), GridAction::Right);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let d = policy.decide(&state, &mut rng).unwrap();
            assert_eq!(d.action, GridAction::Right);
        }
    }
}
