use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use rand::Rng;

use crate::error::RlError;
use crate::policy::{Decision, Policy};

/// Fixed state -> action table. States off the table are an error, not a
/// default: a candidate route only defines actions along itself.
#[derive(Debug, Clone)]
pub struct DeterministicPolicy<S, A> {
    table: HashMap<S, A>,
}

impl<S, A> DeterministicPolicy<S, A>
where
    S: Copy + Eq + Hash + Debug,
    A: Copy,
{
    pub fn new(table: HashMap<S, A>) -> Self {
        Self { table }
    }

    /// Build a policy from a route given as consecutive (state, action) steps.
    pub fn from_route(route: &[(S, A)]) -> Self {
        Self {
            table: route.iter().copied().collect(),
        }
    }

    pub fn action(&self, state: &S) -> Option<A> {
        self.table.get(state).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<S, A> Policy<S, A> for DeterministicPolicy<S, A>
where
    S: Copy + Eq + Hash + Debug,
    A: Copy,
{
    fn decide<R: Rng>(&self, state: &S, _rng: &mut R) -> Result<Decision<A>, RlError> {
        let action = self
            .table
            .get(state)
            .copied()
            .ok_or_else(|| RlError::UndefinedState(format!("{state:?}")))?;
        Ok(Decision {
            action,
            log_prob: None,
        })
    }
}
