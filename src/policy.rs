use rand::Rng;

use crate::error::RlError;

/// One action choice. `log_prob` is `Some` for stochastic policies and
/// `None` for deterministic ones.
pub struct Decision<A> {
    pub action: A,
    pub log_prob: Option<f64>,
}

pub trait Policy<S, A> {
    // 根据状态选择动作
    fn decide<R: Rng>(&self, state: &S, rng: &mut R) -> Result<Decision<A>, RlError>;
}
