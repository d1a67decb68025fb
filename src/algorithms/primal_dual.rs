use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::environments::hazard_grid::{GridAction, GridState, HazardGrid};
use crate::error::RlError;
use crate::policies::softmax::SoftmaxPolicy;
use crate::risk::{self, cost_power};
use crate::simulator::{Trajectory, run_episode};

/// Optional early-stop rule: stop once the average cost has moved less than
/// `tol` between consecutive iterations over the last `window` iterations
/// and the risk constraint is currently satisfied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EarlyStop {
    pub window: usize,
    pub tol: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimalDualConfig {
    pub lr_pi: f64,
    pub lr_lambda: f64,
    /// Discount factor, reserved; the objective is undiscounted total cost.
    pub gamma: f64,
    pub risk_threshold: f64,
    /// Order of the mean-Lp risk statistic.
    pub p: f64,
    pub num_iterations: usize,
    pub batch_size: usize,
    pub step_cap: usize,
    pub early_stop: Option<EarlyStop>,
}

impl Default for PrimalDualConfig {
    fn default() -> Self {
        Self {
            lr_pi: 0.01,
            lr_lambda: 0.005,
            gamma: 1.0,
            risk_threshold: 5.0,
            p: 1.0,
            num_iterations: 1000,
            batch_size: 50,
            step_cap: 100,
            early_stop: None,
        }
    }
}

impl PrimalDualConfig {
    pub fn validate(&self) -> Result<(), RlError> {
        if !(self.lr_pi > 0.0) {
            return Err(RlError::Configuration(format!(
                "lr_pi must be positive, got {}",
                self.lr_pi
            )));
        }
        if !(self.lr_lambda > 0.0) {
            return Err(RlError::Configuration(format!(
                "lr_lambda must be positive, got {}",
                self.lr_lambda
            )));
        }
        if !(0.0 < self.gamma && self.gamma <= 1.0) {
            return Err(RlError::Configuration(format!(
                "gamma must be in (0, 1], got {}",
                self.gamma
            )));
        }
        if !(self.risk_threshold >= 0.0) {
            return Err(RlError::Configuration(format!(
                "risk_threshold must be non-negative, got {}",
                self.risk_threshold
            )));
        }
        if !(self.p >= 1.0) || !self.p.is_finite() {
            return Err(RlError::Configuration(format!(
                "risk order p must be >= 1 and finite, got {}",
                self.p
            )));
        }
        if self.num_iterations == 0 || self.batch_size == 0 || self.step_cap == 0 {
            return Err(RlError::Configuration(
                "num_iterations, batch_size and step_cap must be positive".into(),
            ));
        }
        if let Some(es) = self.early_stop {
            if es.window == 0 || !(es.tol > 0.0) {
                return Err(RlError::Configuration(
                    "early_stop window must be positive and tol > 0".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Per-iteration training metrics, recorded before the parameter updates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IterationMetrics {
    pub average_cost: f64,
    pub risk: f64,
    pub lambda: f64,
}

/// One row per training iteration, returned by value from `train`.
pub type MetricsTrace = Vec<IterationMetrics>;

/// Accumulated policy gradient for one batch. Owns its buffer; `apply`
/// consumes it and returns the updated logits, so parameters and pending
/// gradient never alias.
struct GradientStep {
    grad: Vec<[f64; GridAction::COUNT]>,
}

impl GradientStep {
    fn new(num_states: usize) -> Self {
        Self {
            grad: vec![[0.0; GridAction::COUNT]; num_states],
        }
    }

    /// Add one episode's REINFORCE term. For a tabular softmax,
    /// d log pi(a|s) / d logit[s][a'] = 1[a'=a] - pi(a'|s), and the loss is
    /// -(advantage) * sum of log-probs.
    fn accumulate(
        &mut self,
        policy: &SoftmaxPolicy,
        trajectory: &Trajectory<GridState, GridAction>,
        advantage: f64,
    ) {
        for step in &trajectory.steps {
            let probs = policy.probs(step.state);
            let row = &mut self.grad[policy.state_index(step.state)];
            let taken = step.action.index();
            for a in 0..GridAction::COUNT {
                let indicator = if a == taken { 1.0 } else { 0.0 };
                row[a] -= advantage * (indicator - probs[a]);
            }
        }
    }

    fn scale(&mut self, factor: f64) {
        for row in &mut self.grad {
            for g in row.iter_mut() {
                *g *= factor;
            }
        }
    }

    /// One gradient-descent step; consumes the accumulator.
    fn apply(
        self,
        mut logits: Vec<[f64; GridAction::COUNT]>,
        lr: f64,
    ) -> Vec<[f64; GridAction::COUNT]> {
        for (row, grad) in logits.iter_mut().zip(self.grad) {
            for (l, g) in row.iter_mut().zip(grad) {
                *l -= lr * g;
            }
        }
        logits
    }
}

/// Primal-dual REINFORCE learner: jointly optimizes a tabular softmax policy
/// and a Lagrange multiplier enforcing `risk_p <= risk_threshold`.
///
/// The dual variable may oscillate; fixed-iteration training neither detects
/// nor treats that as an error.
pub struct PrimalDualAgent {
    policy: SoftmaxPolicy,
    lambda: f64,
    config: PrimalDualConfig,
}

impl PrimalDualAgent {
    pub fn new(env: &HazardGrid, config: PrimalDualConfig) -> Result<Self, RlError> {
        config.validate()?;
        Ok(Self {
            policy: SoftmaxPolicy::new(env.config().height, env.config().width),
            lambda: 0.0,
            config,
        })
    }

    pub fn policy(&self) -> &SoftmaxPolicy {
        &self.policy
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn config(&self) -> &PrimalDualConfig {
        &self.config
    }

    /// Run one full training loop and hand the metrics trace to the caller.
    pub fn train<R: Rng>(
        &mut self,
        env: &HazardGrid,
        rng: &mut R,
    ) -> Result<MetricsTrace, RlError> {
        let cfg = self.config.clone();
        let mut trace: MetricsTrace = Vec::with_capacity(cfg.num_iterations);

        for iteration in 0..cfg.num_iterations {
            // Collect the whole batch before touching any parameter.
            let mut batch = Vec::with_capacity(cfg.batch_size);
            for _ in 0..cfg.batch_size {
                batch.push(run_episode(env, &self.policy, cfg.step_cap, rng)?);
            }
            let costs: Vec<f64> = batch.iter().map(|t| t.total_cost).collect();
            let summary = risk::evaluate(&costs, cfg.p)?;

            trace.push(IterationMetrics {
                average_cost: summary.average_cost,
                risk: summary.risk,
                lambda: self.lambda,
            });
            debug!(
                "iter {iteration}: avg_cost = {:.4}, risk_{} = {:.4}, lambda = {:.4}",
                summary.average_cost, cfg.p, summary.risk, self.lambda
            );

            // Primal step: REINFORCE on the Lagrangian-relaxed pseudo-reward
            // R~ = -(C + lambda * C^p), with a batch-statistics baseline.
            let baseline =
                -summary.average_cost - self.lambda * cost_power(summary.average_cost, cfg.p)?;
            let mut step = GradientStep::new(self.policy.logits().len());
            for trajectory in &batch {
                let pseudo_reward =
                    -(trajectory.total_cost + self.lambda * cost_power(trajectory.total_cost, cfg.p)?);
                step.accumulate(&self.policy, trajectory, pseudo_reward - baseline);
            }
            step.scale(1.0 / cfg.batch_size as f64);
            let logits = self.policy.take_logits();
            self.policy.set_logits(step.apply(logits, cfg.lr_pi));

            // Dual step: projected gradient ascent on the constraint violation.
            let violation = summary.risk - cfg.risk_threshold;
            self.lambda = (self.lambda + cfg.lr_lambda * violation).max(0.0);

            if let Some(es) = cfg.early_stop {
                if converged(&trace, es, cfg.risk_threshold) {
                    info!("early stop at iteration {iteration}");
                    break;
                }
            }
        }

        info!(
            "training done after {} iterations: lambda = {:.4}",
            trace.len(),
            self.lambda
        );
        Ok(trace)
    }
}

fn converged(trace: &[IterationMetrics], es: EarlyStop, risk_threshold: f64) -> bool {
    if trace.len() <= es.window {
        return false;
    }
    let window = &trace[trace.len() - es.window - 1..];
    let flat = window
        .windows(2)
        .all(|w| (w[1].average_cost - w[0].average_cost).abs() < es.tol);
    flat && trace.last().is_some_and(|m| m.risk <= risk_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::hazard_grid::GridConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn env() -> HazardGrid {
        HazardGrid::new(GridConfig::default()).unwrap()
    }

    #[test]
    fn config_validation_rejects_bad_orders_and_rates() {
        let mut cfg = PrimalDualConfig::default();
        cfg.p = 0.5;
        assert!(cfg.validate().is_err());

        let mut cfg = PrimalDualConfig::default();
        cfg.lr_pi = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = PrimalDualConfig::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn trace_has_one_row_per_iteration_and_lambda_stays_nonnegative() {
        let env = env();
        let cfg = PrimalDualConfig {
            num_iterations: 25,
            batch_size: 8,
            p: 2.0,
            risk_threshold: 5.0,
            ..PrimalDualConfig::default()
        };
        let mut agent = PrimalDualAgent::new(&env, cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let trace = agent.train(&env, &mut rng).unwrap();
        assert_eq!(trace.len(), 25);
        for row in &trace {
            assert!(row.lambda >= 0.0);
            assert!(row.average_cost.is_finite());
            assert!(row.risk.is_finite());
            // Lp monotonicity: risk_2 >= risk_1 = mean.
            assert!(row.risk >= row.average_cost - 1e-9);
        }
        assert!(agent.lambda() >= 0.0);
    }

    #[test]
    fn dual_projection_never_goes_negative() {
        // Pure dual-ascent recurrence, decoupled from the policy.
        let mut lambda = 0.0f64;
        let threshold = 5.0;
        for (i, risk) in [0.0, 10.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0]
            .into_iter()
            .cycle()
            .take(1000)
            .enumerate()
        {
            let lr = 0.1 + (i % 7) as f64 * 0.05;
            lambda = (lambda + lr * (risk - threshold)).max(0.0);
            assert!(lambda >= 0.0);
        }
    }

    #[test]
    fn gradient_step_moves_logits_toward_advantaged_actions() {
        use crate::simulator::{EpisodeOutcome, Step};

        let policy = SoftmaxPolicy::new(5, 5);
        let state = GridState::new(0, 0);
        let traj = Trajectory {
            steps: vec![Step {
                state,
                action: GridAction::Down,
                log_prob: Some(0.25f64.ln()),
            }],
            total_cost: 4.0,
            outcome: EpisodeOutcome::Goal,
        };

        let mut step = GradientStep::new(policy.logits().len());
        step.accumulate(&policy, &traj, 1.0);
        let updated = step.apply(policy.logits().to_vec(), 0.5);

        let mut after = SoftmaxPolicy::new(5, 5);
        after.set_logits(updated);
        let probs = after.probs(state);
        // Positive advantage raises the taken action above the alternatives.
        for a in 0..GridAction::COUNT {
            if a != GridAction::Down.index() {
                assert!(probs[GridAction::Down.index()] > probs[a]);
            }
        }
    }

    #[test]
    fn early_stop_cuts_training_short() {
        let env = env();
        let cfg = PrimalDualConfig {
            num_iterations: 200,
            batch_size: 16,
            risk_threshold: 1000.0, // trivially satisfied
            early_stop: Some(EarlyStop {
                window: 3,
                tol: 100.0, // trips as soon as the window fills
            }),
            ..PrimalDualConfig::default()
        };
        let mut agent = PrimalDualAgent::new(&env, cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let trace = agent.train(&env, &mut rng).unwrap();
        assert_eq!(trace.len(), 4);
    }
}
