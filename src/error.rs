use thiserror::Error;

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum RlError {
    /// An action index outside `0..GridAction::COUNT` was supplied.
    #[error("invalid action index {0} (expected 0..4)")]
    InvalidAction(usize),

    /// A deterministic policy was queried at a state it has no action for.
    #[error("policy has no action for state {0}")]
    UndefinedState(String),

    /// Invalid configuration (bad grid layout, p < 1, empty sample, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A numeric intermediate overflowed or turned non-finite.
    #[error("computation error: {0}")]
    Computation(String),
}
