//! Planar geometry used by collision and lane checks.

use std::f32::consts::{PI, TAU};

/// A 2D point as `[x, y]`.
pub type Point = [f32; 2];

/// Euclidean distance between two planar points.
pub fn distance_2d(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let dx = x2 - x1;
    let dy = y2 - y1;
    (dx * dx + dy * dy).sqrt()
}

/// Absolute angular difference between two headings, wrapped to `[0, π]`.
///
/// Inputs may be unbounded; agent headings are never normalized after
/// integration.
pub fn heading_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).rem_euclid(TAU);
    if diff > PI {
        TAU - diff
    } else {
        diff
    }
}

/// Tests whether segment `p1-p2` intersects segment `q1-q2`.
///
/// Endpoints count as intersections. Parallel (including collinear)
/// segments never intersect.
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    if p1[0].max(p2[0]) < q1[0].min(q2[0])
        || p1[0].min(p2[0]) > q1[0].max(q2[0])
        || p1[1].max(p2[1]) < q1[1].min(q2[1])
        || p1[1].min(p2[1]) > q1[1].max(q2[1])
    {
        return false;
    }

    let dx1 = p2[0] - p1[0];
    let dy1 = p2[1] - p1[1];
    let dx2 = q2[0] - q1[0];
    let dy2 = q2[1] - q1[1];

    let cross = dx1 * dy2 - dy1 * dx2;
    if cross == 0.0 {
        return false;
    }

    let dx3 = p1[0] - q1[0];
    let dy3 = p1[1] - q1[1];

    let s = (dx1 * dy3 - dy1 * dx3) / cross;
    let t = (dx2 * dy3 - dy2 * dx3) / cross;

    (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
}

/// Shortest distance from point `p` to segment `a-b`.
pub fn point_to_segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];

    if dx == 0.0 && dy == 0.0 {
        return distance_2d(p[0], p[1], a[0], a[1]);
    }

    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0);
    distance_2d(p[0], p[1], a[0] + t * dx, a[1] + t * dy)
}

/// Corner sign pattern: top-left, top-right, bottom-right, bottom-left.
const CORNER_SIGNS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]];

/// Heading-aligned rectangle used as a vehicle footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub x: f32,
    pub y: f32,
    /// Cosine of the heading.
    pub cos: f32,
    /// Sine of the heading.
    pub sin: f32,
    pub half_length: f32,
    pub half_width: f32,
}

impl OrientedBox {
    /// Creates a box centred at `(x, y)` with full `length` along the heading.
    pub fn new(x: f32, y: f32, heading: f32, length: f32, width: f32) -> Self {
        Self {
            x,
            y,
            cos: heading.cos(),
            sin: heading.sin(),
            half_length: length * 0.5,
            half_width: width * 0.5,
        }
    }

    /// World-space corners, walking the outline so that consecutive corners
    /// (wrapping around) form the box edges.
    pub fn corners(&self) -> [Point; 4] {
        CORNER_SIGNS.map(|[l, w]| {
            [
                self.x + (l * self.half_length * self.cos - w * self.half_width * self.sin),
                self.y + (l * self.half_length * self.sin + w * self.half_width * self.cos),
            ]
        })
    }

    /// The four box edges as corner pairs.
    pub fn edges(&self) -> [(Point, Point); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }

    /// Separating-axis overlap test against another box.
    ///
    /// Candidate axes are the length and width directions of both boxes.
    /// Touching boxes count as overlapping.
    pub fn overlaps(&self, other: &OrientedBox) -> bool {
        let axes = [
            [self.cos, self.sin],
            [-self.sin, self.cos],
            [other.cos, other.sin],
            [-other.sin, other.cos],
        ];
        let mine = self.corners();
        let theirs = other.corners();

        axes.iter().all(|axis| {
            let (min1, max1) = project(&mine, axis);
            let (min2, max2) = project(&theirs, axis);
            !(max1 < min2 || min1 > max2)
        })
    }
}

fn project(corners: &[Point; 4], axis: &Point) -> (f32, f32) {
    corners
        .iter()
        .map(|c| c[0] * axis[0] + c[1] * axis[1])
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p), hi.max(p))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn crossing_segments_intersect() {
        assert!(segments_intersect(
            [0.0, 0.0],
            [2.0, 2.0],
            [0.0, 2.0],
            [2.0, 0.0]
        ));
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        assert!(!segments_intersect(
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0]
        ));
        assert!(!segments_intersect(
            [0.0, 0.0],
            [1.0, 1.0],
            [3.0, 0.0],
            [2.0, 1.0]
        ));
    }

    #[test]
    fn parallel_segments_never_intersect() {
        assert!(!segments_intersect(
            [0.0, 0.0],
            [2.0, 0.0],
            [1.0, 0.0],
            [3.0, 0.0]
        ));
    }

    #[test]
    fn touching_endpoint_counts() {
        assert!(segments_intersect(
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, -1.0],
            [1.0, 1.0]
        ));
    }

    #[test]
    fn point_segment_distance_cases() {
        assert_abs_diff_eq!(
            point_to_segment_distance([5.0, 3.0], [0.0, 0.0], [10.0, 0.0]),
            3.0,
            epsilon = 1e-6
        );
        // Beyond the end clamps to the endpoint.
        assert_abs_diff_eq!(
            point_to_segment_distance([13.0, 4.0], [0.0, 0.0], [10.0, 0.0]),
            5.0,
            epsilon = 1e-6
        );
        // Degenerate segment.
        assert_abs_diff_eq!(
            point_to_segment_distance([3.0, 4.0], [0.0, 0.0], [0.0, 0.0]),
            5.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn heading_difference_wraps() {
        assert_abs_diff_eq!(heading_difference(0.1, -0.1), 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(heading_difference(PI - 0.1, -PI + 0.1), 0.2, epsilon = 1e-5);
        assert_abs_diff_eq!(heading_difference(4.0 * TAU + 0.3, 0.0), 0.3, epsilon = 1e-4);
    }

    #[test]
    fn corners_of_axis_aligned_box() {
        let b = OrientedBox::new(0.0, 0.0, 0.0, 4.0, 2.0);
        let c = b.corners();
        assert_abs_diff_eq!(c[0][0], -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c[0][1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c[2][0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c[2][1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn head_on_boxes_overlap_both_ways() {
        let a = OrientedBox::new(0.0, 0.0, 0.0, 4.0, 2.0);
        let b = OrientedBox::new(1.0, 0.0, PI, 4.0, 2.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn separated_boxes_do_not_overlap() {
        let a = OrientedBox::new(0.0, 0.0, 0.0, 4.0, 2.0);
        let b = OrientedBox::new(0.0, 3.0, 0.0, 4.0, 2.0);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn rotated_box_gap_found_on_own_axis() {
        // Diamond next to a square: the AABBs overlap but the boxes do not.
        let a = OrientedBox::new(0.0, 0.0, 0.0, 2.0, 2.0);
        let b = OrientedBox::new(2.3, 2.3, PI / 4.0, 2.0, 2.0);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn overlap_is_symmetric_over_a_sweep() {
        for i in 0..24 {
            let heading = i as f32 * 0.27;
            let offset = 0.5 + i as f32 * 0.25;
            let a = OrientedBox::new(0.0, 0.0, 0.3, 4.5, 1.8);
            let b = OrientedBox::new(offset, offset * 0.5, heading, 4.0, 2.0);
            assert_eq!(a.overlaps(&b), b.overlaps(&a), "asymmetric at step {i}");
        }
    }
}
