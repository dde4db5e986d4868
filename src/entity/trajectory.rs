//! Time-indexed trajectory storage.

/// Recorded path of an entity.
///
/// For agents this is the expert replay: one sample per timestep with
/// position, velocity, heading and a validity flag. For road geometry it is
/// the polyline, and only `x`, `y` and `z` are populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub vx: Vec<f32>,
    pub vy: Vec<f32>,
    pub vz: Vec<f32>,
    pub heading: Vec<f32>,
    pub valid: Vec<bool>,
}

impl Trajectory {
    /// Builds a road polyline from `(x, y)` points at `z = 0`.
    pub fn polyline(points: &[(f32, f32)]) -> Self {
        Self {
            x: points.iter().map(|p| p.0).collect(),
            y: points.iter().map(|p| p.1).collect(),
            z: vec![0.0; points.len()],
            ..Self::default()
        }
    }

    /// Builds a fully valid agent trajectory from `(x, y, heading, speed)`
    /// samples. Velocity points along the heading.
    pub fn from_poses(poses: &[(f32, f32, f32, f32)]) -> Self {
        Self {
            x: poses.iter().map(|p| p.0).collect(),
            y: poses.iter().map(|p| p.1).collect(),
            z: vec![0.0; poses.len()],
            vx: poses.iter().map(|p| p.3 * p.2.cos()).collect(),
            vy: poses.iter().map(|p| p.3 * p.2.sin()).collect(),
            vz: vec![0.0; poses.len()],
            heading: poses.iter().map(|p| p.2).collect(),
            valid: vec![true; poses.len()],
        }
    }

    /// Number of samples (`array_size`).
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Whether the kinematic arrays are present (agent trajectories only).
    pub fn has_kinematics(&self) -> bool {
        self.heading.len() == self.len() && self.valid.len() == self.len() && !self.is_empty()
    }

    /// Validity flag at `t`; out-of-range and road samples are invalid.
    pub fn is_valid(&self, t: usize) -> bool {
        self.valid.get(t).copied().unwrap_or(false)
    }

    /// Planar point at index `i`.
    pub fn point(&self, i: usize) -> Option<(f32, f32)> {
        Some((*self.x.get(i)?, *self.y.get(i)?))
    }

    /// Planar endpoints of segment `i` (points `i` and `i + 1`).
    pub fn segment(&self, i: usize) -> Option<((f32, f32), (f32, f32))> {
        Some((self.point(i)?, self.point(i + 1)?))
    }

    /// Number of consecutive-point segments in the polyline.
    pub fn segment_count(&self) -> usize {
        self.len().saturating_sub(1)
    }
}
