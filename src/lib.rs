//! drivesim - multi-agent driving simulation for reinforcement learning
//!
//! Replays recorded traffic scenarios, lets a policy drive a subset of the
//! vehicles with a kinematic bicycle model, and produces per-agent
//! observations, rewards and episode statistics.

pub mod entity;
pub mod geometry;
pub mod grid;
pub mod map;
pub mod sim;
pub mod topology;

pub use entity::{CollisionState, Entity, EntityType, Trajectory};
pub use map::{MapData, MapError};
pub use sim::{Action, ActionType, Drive, DriveConfig, DriveError, EvaluationMetrics, Log, Policy};
