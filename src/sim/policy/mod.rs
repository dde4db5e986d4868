//! Policy trait and implementations.

pub mod heuristic;
pub mod random;
pub mod trait_;

pub use heuristic::GoalSeekingPolicy;
pub use random::{NoopPolicy, RandomPolicy};
pub use trait_::Policy;
