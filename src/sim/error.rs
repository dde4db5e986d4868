use thiserror::Error;

use super::config::DynamicsModel;

/// Errors found while validating a [`DriveConfig`](super::DriveConfig).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Scenario length must be at least one step")]
    ZeroScenarioLength,

    #[error("init_steps ({init_steps}) must be below scenario_length ({scenario_length})")]
    InitStepsBeyondScenario {
        init_steps: usize,
        scenario_length: usize,
    },

    #[error("Goal radius must be positive and finite, got {0}")]
    InvalidGoalRadius(f32),

    #[error("max_agents must be between 1 and {max}, got {requested}")]
    AgentCapacity { requested: usize, max: usize },

    #[error("Dynamics model {0:?} is not implemented")]
    UnsupportedDynamics(DynamicsModel),
}

/// Errors surfaced by the simulation API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DriveError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Selected {requested} active agents but logs were sized for {capacity}")]
    LogCapacityExceeded { requested: usize, capacity: usize },

    #[error("Expected {expected} actions, got {actual}")]
    ActionCount { expected: usize, actual: usize },

    #[error("Action {index} is out of range: acceleration {acceleration}, steering {steering}")]
    InvalidAction {
        index: usize,
        acceleration: usize,
        steering: usize,
    },

    #[error("Action {index} does not match the configured action type")]
    ActionTypeMismatch { index: usize },
}
