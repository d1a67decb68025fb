// detailed implementation
pub mod algorithms;
pub mod environments;
pub mod policies;
pub mod risk;
pub mod simulator;

// Traits
pub mod environment;
pub mod policy;

pub mod error;

pub use error::RlError;
