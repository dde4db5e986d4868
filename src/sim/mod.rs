//! The multi-agent driving simulation.
//!
//! [`Drive`] owns a decoded map and runs episodes: agent selection, the
//! kinematic bicycle model for policy agents, expert replay, collision and
//! lane evaluation, rewards, goal handling and observation encoding.
//! Baseline policies and an evaluation loop live alongside it.

pub mod config;
pub mod dynamics;
pub mod environment;
pub mod error;
pub mod evaluation;
pub mod goal;
pub mod log;
pub mod metrics;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod selection;

#[cfg(test)]
mod tests;

pub use config::{ActionType, DriveConfig, DynamicsModel, MAX_AGENTS, MAX_ROAD_SEGMENT_OBSERVATIONS};
pub use dynamics::Action;
pub use environment::{Drive, StepStatus};
pub use error::{ConfigError, DriveError};
pub use evaluation::EvaluationMetrics;
pub use log::Log;
pub use observation::ObservationBuilder;
pub use policy::{GoalSeekingPolicy, NoopPolicy, Policy, RandomPolicy};
pub use reward::RewardComputer;
pub use selection::{Roster, SelectionMode};
