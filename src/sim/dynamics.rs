//! Vehicle dynamics and expert replay.

use crate::entity::Entity;

/// Acceleration table for discrete actions, in m/s².
pub const ACCELERATION_VALUES: [f32; 7] = [-4.0, -2.667, -1.333, 0.0, 1.333, 2.667, 4.0];

/// Steering table for discrete actions, in radians.
pub const STEERING_VALUES: [f32; 13] = [
    -1.0, -0.833, -0.667, -0.5, -0.333, -0.167, 0.0, 0.167, 0.333, 0.5, 0.667, 0.833, 1.0,
];

/// Integration step in seconds.
pub const DT: f32 = 0.1;

/// Speed clip, in either direction.
pub const MAX_SPEED: f32 = 100.0;

/// One agent's control input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Indices into [`ACCELERATION_VALUES`] and [`STEERING_VALUES`].
    Discrete { acceleration: usize, steering: usize },
    /// Raw acceleration and steering angle.
    Continuous { acceleration: f32, steering: f32 },
}

impl Action {
    /// Zero acceleration, straight wheels.
    pub const NOOP: Action = Action::Discrete {
        acceleration: 3,
        steering: 6,
    };

    /// Resolves the action to `(acceleration, steering)`.
    ///
    /// Returns `None` for discrete indices outside the tables.
    pub fn controls(&self) -> Option<(f32, f32)> {
        match *self {
            Action::Discrete {
                acceleration,
                steering,
            } => Some((
                *ACCELERATION_VALUES.get(acceleration)?,
                *STEERING_VALUES.get(steering)?,
            )),
            Action::Continuous {
                acceleration,
                steering,
            } => Some((acceleration, steering)),
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Action::Discrete { .. })
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::NOOP
    }
}

/// Advances one agent with the kinematic bicycle model.
///
/// ```text
/// speed    = clip(|v| + 0.5·a·dt, ±MAX_SPEED)
/// beta     = atan(0.5·tan(δ))
/// yaw_rate = speed·cos(beta)·tan(δ) / length
/// v'       = speed·(cos(θ + beta), sin(θ + beta))
/// p'       = p + v'·dt,  θ' = θ + yaw_rate·dt
/// ```
///
/// The heading is not wrapped after the update. A zero-length entity
/// keeps its heading.
pub fn step_classic(entity: &mut Entity, acceleration: f32, steering: f32) {
    let speed = (entity.speed() + 0.5 * acceleration * DT).clamp(-MAX_SPEED, MAX_SPEED);
    let tan_steer = steering.tan();
    let beta = (0.5 * tan_steer).atan();
    let yaw_rate = if entity.length > 0.0 {
        speed * beta.cos() * tan_steer / entity.length
    } else {
        0.0
    };

    let direction = entity.heading + beta;
    entity.vx = speed * direction.cos();
    entity.vy = speed * direction.sin();
    entity.x += entity.vx * DT;
    entity.y += entity.vy * DT;
    entity.set_heading(entity.heading + yaw_rate * DT);
}

/// Copies the recorded pose at `t` onto the entity.
///
/// Out-of-range or invalid samples put the entity off-map with zero
/// velocity.
pub fn replay_expert(entity: &mut Entity, t: usize) {
    if !entity.trajectory.is_valid(t) {
        entity.set_off_map();
        entity.vx = 0.0;
        entity.vy = 0.0;
        return;
    }
    let traj = &entity.trajectory;
    entity.x = traj.x[t];
    entity.y = traj.y[t];
    entity.z = traj.z[t];
    entity.vx = traj.vx.get(t).copied().unwrap_or(0.0);
    entity.vy = traj.vy.get(t).copied().unwrap_or(0.0);
    let heading = traj.heading[t];
    entity.set_heading(heading);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, Trajectory, INVALID_POSITION};
    use approx::assert_abs_diff_eq;

    fn car(speed: f32, heading: f32) -> Entity {
        let traj = Trajectory::from_poses(&[(0.0, 0.0, heading, speed), (1.0, 1.0, 0.3, 2.0)]);
        let mut e = Entity::agent(EntityType::Vehicle, traj, 4.0, 2.0, (50.0, 0.0));
        e.vx = speed * heading.cos();
        e.vy = speed * heading.sin();
        e
    }

    #[test]
    fn noop_resolves_to_zero() {
        assert_eq!(Action::NOOP.controls(), Some((0.0, 0.0)));
        assert_eq!(
            Action::Discrete {
                acceleration: 7,
                steering: 0
            }
            .controls(),
            None
        );
        assert_eq!(
            Action::Discrete {
                acceleration: 0,
                steering: 13
            }
            .controls(),
            None
        );
    }

    #[test]
    fn straight_line_coasting() {
        let mut e = car(10.0, 0.0);
        step_classic(&mut e, 0.0, 0.0);
        assert_abs_diff_eq!(e.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(e.y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.heading, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(e.speed(), 10.0, epsilon = 1e-5);
    }

    #[test]
    fn acceleration_adds_half_a_dt() {
        let mut e = car(10.0, 0.0);
        step_classic(&mut e, 4.0, 0.0);
        assert_abs_diff_eq!(e.speed(), 10.2, epsilon = 1e-5);
    }

    #[test]
    fn speed_is_clipped() {
        let mut e = car(99.9, 0.0);
        step_classic(&mut e, 4.0, 0.0);
        assert_abs_diff_eq!(e.speed(), MAX_SPEED, epsilon = 1e-4);
    }

    #[test]
    fn steering_turns_left_and_slips() {
        let mut e = car(10.0, 0.0);
        step_classic(&mut e, 0.0, 0.5);
        let beta = (0.5f32 * 0.5f32.tan()).atan();
        let yaw = 10.0 * beta.cos() * 0.5f32.tan() / 4.0;
        assert_abs_diff_eq!(e.heading, yaw * DT, epsilon = 1e-6);
        assert_abs_diff_eq!(e.vy, 10.0 * beta.sin(), epsilon = 1e-5);
        assert_abs_diff_eq!(e.heading_x, e.heading.cos(), epsilon = 1e-6);
    }

    #[test]
    fn heading_is_not_wrapped() {
        let mut e = car(10.0, 3.1);
        for _ in 0..20 {
            step_classic(&mut e, 0.0, 1.0);
        }
        assert!(e.heading > std::f32::consts::PI);
    }

    #[test]
    fn replay_copies_recorded_pose() {
        let mut e = car(0.0, 0.0);
        replay_expert(&mut e, 1);
        assert_eq!((e.x, e.y), (1.0, 1.0));
        assert_abs_diff_eq!(e.heading, 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(e.speed(), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn replay_out_of_range_goes_off_map() {
        let mut e = car(0.0, 0.0);
        replay_expert(&mut e, 2);
        assert_eq!(e.x, INVALID_POSITION);
        assert_eq!(e.heading_x, 1.0);

        let mut e = car(0.0, 0.0);
        e.trajectory.valid[1] = false;
        replay_expert(&mut e, 1);
        assert!(e.is_off_map());
    }
}
