use rand::Rng;

pub struct StepResult<S> {
    pub next_state: S,
    pub cost: f64,
    pub terminal: bool,
}

/// A transition model. `step` is a pure function of `(state, action, rng)`;
/// all stochasticity flows through the caller-provided generator.
pub trait Environment {
    type State: Copy;
    type Action: Copy;

    fn start_state(&self) -> Self::State;

    fn step<R: Rng>(
        &self,
        state: Self::State,
        action: Self::Action,
        rng: &mut R,
    ) -> StepResult<Self::State>; // (next_state, cost, if_terminal)

    /// 动作空间维度
    fn action_space(&self) -> usize;
}
