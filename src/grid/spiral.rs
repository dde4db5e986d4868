//! Spiral neighbor offsets.

/// Direction cycle: right, up, left, down.
const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Generates `vision_range²` cell offsets walking outwards from `(0, 0)`.
///
/// The walk starts at the center and cycles right, up, left and down,
/// lengthening its run every two turns. Offsets
/// outside `±vision_range / 2` on either axis are walked over but not
/// emitted, so the result is exactly the square window in spiral order.
///
/// # Arguments
///
/// * `vision_range` - Side length of the square window, in cells. Odd values
///   give a window centred on the origin.
pub fn spiral_offsets(vision_range: usize) -> Vec<(i32, i32)> {
    let max_offsets = vision_range * vision_range;
    let half = (vision_range / 2) as i32;
    let mut offsets = Vec::with_capacity(max_offsets);
    if max_offsets == 0 {
        return offsets;
    }
    offsets.push((0, 0));

    let (mut x, mut y) = (0i32, 0i32);
    let mut dir = 0;
    let mut run_length = 1;
    let mut steps_taken = 0;
    let mut turns = 0;

    while offsets.len() < max_offsets {
        let (dx, dy) = DIRECTIONS[dir];
        x += dx;
        y += dy;
        if x.abs() <= half && y.abs() <= half {
            offsets.push((x, y));
        }

        steps_taken += 1;
        if steps_taken != run_length {
            continue;
        }
        steps_taken = 0;
        dir = (dir + 1) % DIRECTIONS.len();
        turns += 1;
        if turns % 2 == 0 {
            run_length += 1;
        }
    }

    offsets
}
