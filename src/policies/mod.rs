pub mod deterministic;
pub mod softmax;
