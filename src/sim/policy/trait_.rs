//! Policy trait for the driving simulation.

use crate::sim::dynamics::Action;

/// A policy that selects actions for active agents from their observations.
pub trait Policy: Send + Sync {
    /// Selects one action per active agent.
    ///
    /// # Arguments
    ///
    /// * `observations` - Flat buffer from [`Drive::observations`](crate::sim::Drive::observations),
    ///   one [`DriveConfig::observation_dim`](crate::sim::DriveConfig::observation_dim) row per agent
    ///
    /// # Returns
    ///
    /// A vector of actions, one per row.
    fn select_actions(&mut self, observations: &[f32]) -> Vec<Action>;

    /// Returns a human-readable name for this policy.
    fn name(&self) -> &str;
}

/// Number of agent rows in a flat observation buffer.
pub(crate) fn agent_rows(observations: &[f32]) -> usize {
    observations.len() / crate::sim::DriveConfig::observation_dim()
}
