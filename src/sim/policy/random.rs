//! Random and no-op baselines.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::trait_::{agent_rows, Policy};
use crate::sim::config::ActionType;
use crate::sim::dynamics::{Action, ACCELERATION_VALUES, STEERING_VALUES};

/// Continuous acceleration bound, matching the discrete table.
const MAX_ACCELERATION: f32 = 4.0;
/// Continuous steering bound, matching the discrete table.
const MAX_STEERING: f32 = 1.0;

/// Uniformly random actions of the configured type.
///
/// Used for sanity checks and as a lower-bound baseline.
pub struct RandomPolicy {
    action_type: ActionType,
    rng: StdRng,
}

impl RandomPolicy {
    /// Creates a new random policy.
    ///
    /// # Arguments
    ///
    /// * `action_type` - Must match the simulation's configured type
    /// * `seed` - Seed for reproducible action streams
    pub fn new(action_type: ActionType, seed: u64) -> Self {
        Self {
            action_type,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn select_actions(&mut self, observations: &[f32]) -> Vec<Action> {
        (0..agent_rows(observations))
            .map(|_| match self.action_type {
                ActionType::Discrete => Action::Discrete {
                    acceleration: self.rng.gen_range(0..ACCELERATION_VALUES.len()),
                    steering: self.rng.gen_range(0..STEERING_VALUES.len()),
                },
                ActionType::Continuous => Action::Continuous {
                    acceleration: self.rng.gen_range(-MAX_ACCELERATION..=MAX_ACCELERATION),
                    steering: self.rng.gen_range(-MAX_STEERING..=MAX_STEERING),
                },
            })
            .collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

/// Zero acceleration and straight wheels for every agent.
pub struct NoopPolicy {
    action_type: ActionType,
}

impl NoopPolicy {
    pub fn new(action_type: ActionType) -> Self {
        Self { action_type }
    }
}

impl Policy for NoopPolicy {
    fn select_actions(&mut self, observations: &[f32]) -> Vec<Action> {
        let action = match self.action_type {
            ActionType::Discrete => Action::NOOP,
            ActionType::Continuous => Action::Continuous {
                acceleration: 0.0,
                steering: 0.0,
            },
        };
        vec![action; agent_rows(observations)]
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::DriveConfig;

    fn rows(n: usize) -> Vec<f32> {
        vec![0.0; n * DriveConfig::observation_dim()]
    }

    #[test]
    fn random_policy_returns_one_action_per_row() {
        let mut policy = RandomPolicy::new(ActionType::Discrete, 3);
        let actions = policy.select_actions(&rows(4));
        assert_eq!(actions.len(), 4);
        assert!(actions.iter().all(|a| a.controls().is_some()));
    }

    #[test]
    fn random_policy_is_seeded() {
        let mut a = RandomPolicy::new(ActionType::Continuous, 9);
        let mut b = RandomPolicy::new(ActionType::Continuous, 9);
        let obs = rows(10);
        assert_eq!(a.select_actions(&obs), b.select_actions(&obs));
    }

    #[test]
    fn continuous_actions_in_range() {
        let mut policy = RandomPolicy::new(ActionType::Continuous, 1);
        for action in policy.select_actions(&rows(100)) {
            let Action::Continuous {
                acceleration,
                steering,
            } = action
            else {
                panic!("expected continuous action");
            };
            assert!(acceleration.abs() <= MAX_ACCELERATION);
            assert!(steering.abs() <= MAX_STEERING);
        }
    }

    #[test]
    fn noop_matches_action_type() {
        let mut policy = NoopPolicy::new(ActionType::Discrete);
        assert_eq!(policy.select_actions(&rows(2)), vec![Action::NOOP; 2]);
        let mut policy = NoopPolicy::new(ActionType::Continuous);
        assert!(!policy.select_actions(&rows(1))[0].is_discrete());
        assert!(policy.select_actions(&[]).is_empty());
    }
}
