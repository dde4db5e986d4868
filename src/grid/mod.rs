//! Uniform spatial grid over road geometry.
//!
//! Every segment of a lane, road line or road edge is registered in the cell
//! containing its midpoint. A per-cell neighbor cache, built once, holds the
//! concatenated contents of every cell in the spiral vision window so that
//! per-step lookups are a slice borrow.

mod spiral;

pub use spiral::spiral_offsets;

use tracing::{debug, warn};

use crate::entity::{Entity, INVALID_POSITION};

/// Side length of a grid cell in world units.
pub const GRID_CELL_SIZE: f32 = 5.0;

/// Side length, in cells, of the neighbor cache window.
pub const VISION_RANGE: usize = 21;

/// 5x5 window used by the offroad and lane checks, row-major from `(-2, -2)`.
#[rustfmt::skip]
pub const COLLISION_OFFSETS: [(i32, i32); 25] = [
    (-2, -2), (-1, -2), (0, -2), (1, -2), (2, -2),
    (-2, -1), (-1, -1), (0, -1), (1, -1), (2, -1),
    (-2, 0), (-1, 0), (0, 0), (1, 0), (2, 0),
    (-2, 1), (-1, 1), (0, 1), (1, 1), (2, 1),
    (-2, 2), (-1, 2), (0, 2), (1, 2), (2, 2),
];

/// One road segment: points `geometry_idx` and `geometry_idx + 1` of
/// entity `entity_idx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridEntry {
    pub entity_idx: usize,
    pub geometry_idx: usize,
}

/// World-space extent of the gridded road points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridBounds {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub bottom_right_x: f32,
    pub bottom_right_y: f32,
}

impl GridBounds {
    /// Bounding box of every non-sentinel point of gridded road entities.
    ///
    /// Returns `None` when there are no such points.
    pub fn from_entities(entities: &[Entity]) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        let points = entities
            .iter()
            .filter(|e| e.entity_type.is_gridded())
            .flat_map(|e| e.trajectory.x.iter().zip(&e.trajectory.y))
            .filter(|(&x, &y)| x != INVALID_POSITION && y != INVALID_POSITION);

        for (&x, &y) in points {
            let b = bounds.get_or_insert(Self {
                top_left_x: x,
                top_left_y: y,
                bottom_right_x: x,
                bottom_right_y: y,
            });
            b.top_left_x = b.top_left_x.min(x);
            b.bottom_right_x = b.bottom_right_x.max(x);
            b.top_left_y = b.top_left_y.max(y);
            b.bottom_right_y = b.bottom_right_y.min(y);
        }
        bounds
    }

    pub fn width(&self) -> f32 {
        self.bottom_right_x - self.top_left_x
    }

    pub fn height(&self) -> f32 {
        self.top_left_y - self.bottom_right_y
    }

    /// A grid with no horizontal extent cannot index anything.
    pub fn is_degenerate(&self) -> bool {
        self.top_left_x >= self.bottom_right_x
    }
}

/// Spatial hash of road segments with a precomputed neighbor cache.
#[derive(Debug, Clone)]
pub struct GridMap {
    bounds: GridBounds,
    cols: usize,
    rows: usize,
    cell_size: f32,
    cells: Vec<Vec<GridEntry>>,
    neighbor_offsets: Vec<(i32, i32)>,
    neighbor_cache: Vec<Vec<GridEntry>>,
}

impl GridMap {
    /// Builds the grid and its neighbor cache with the default vision range.
    pub fn build(entities: &[Entity]) -> Self {
        Self::with_vision_range(entities, VISION_RANGE)
    }

    /// Builds the grid with a custom neighbor cache window.
    ///
    /// Each axis gets `floor(extent / GRID_CELL_SIZE) + 1` cells, so a point
    /// on the far boundary still has a cell.
    ///
    /// Cells are filled in two passes: segments are first counted per cell
    /// so each cell vector is allocated at its final size, then inserted.
    ///
    /// # Arguments
    ///
    /// * `entities` - Full entity list; only lanes, road lines and road edges are indexed
    /// * `vision_range` - Side length in cells of the cached neighborhood
    pub fn with_vision_range(entities: &[Entity], vision_range: usize) -> Self {
        let bounds = GridBounds::from_entities(entities).unwrap_or_default();
        let (cols, rows) = if bounds.is_degenerate() {
            (0, 0)
        } else {
            (
                (bounds.width() / GRID_CELL_SIZE).floor() as usize + 1,
                (bounds.height() / GRID_CELL_SIZE).floor() as usize + 1,
            )
        };

        let mut grid = Self {
            bounds,
            cols,
            rows,
            cell_size: GRID_CELL_SIZE,
            cells: Vec::new(),
            neighbor_offsets: spiral_offsets(vision_range),
            neighbor_cache: Vec::new(),
        };

        let mut counts = vec![0usize; grid.cell_count()];
        grid.for_each_segment(entities, |cell, entry| match cell {
            Some(cell) => counts[cell] += 1,
            None => warn!(
                entity_idx = entry.entity_idx,
                geometry_idx = entry.geometry_idx,
                "road segment midpoint falls outside the grid"
            ),
        });

        let mut cells: Vec<Vec<GridEntry>> =
            counts.iter().map(|&n| Vec::with_capacity(n)).collect();
        grid.for_each_segment(entities, |cell, entry| {
            if let Some(cell) = cell {
                cells[cell].push(entry);
            }
        });
        grid.cells = cells;

        grid.build_neighbor_cache();

        debug!(
            cols,
            rows,
            segments = grid.cells.iter().map(Vec::len).sum::<usize>(),
            "grid map built"
        );
        grid
    }

    /// Visits every gridded segment with the cell of its midpoint.
    fn for_each_segment<F>(&self, entities: &[Entity], mut visit: F)
    where
        F: FnMut(Option<usize>, GridEntry),
    {
        for (entity_idx, entity) in entities.iter().enumerate() {
            if !entity.entity_type.is_gridded() {
                continue;
            }
            for geometry_idx in 0..entity.trajectory.segment_count() {
                let Some(((x0, y0), (x1, y1))) = entity.trajectory.segment(geometry_idx) else {
                    continue;
                };
                let (mx, my) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
                visit(
                    self.grid_index(mx, my),
                    GridEntry {
                        entity_idx,
                        geometry_idx,
                    },
                );
            }
        }
    }

    fn build_neighbor_cache(&mut self) {
        let mut cache = Vec::with_capacity(self.cell_count());
        for cell in 0..self.cell_count() {
            let total: usize = self
                .offset_cells(cell, &self.neighbor_offsets)
                .map(|c| self.cells[c].len())
                .sum();
            let mut entries = Vec::with_capacity(total);
            for c in self.offset_cells(cell, &self.neighbor_offsets) {
                entries.extend_from_slice(&self.cells[c]);
            }
            cache.push(entries);
        }
        self.neighbor_cache = cache;
    }

    /// Cell index containing `(x, y)`, or `None` if the grid is degenerate
    /// or the point lies outside it.
    pub fn grid_index(&self, x: f32, y: f32) -> Option<usize> {
        if self.bounds.is_degenerate() {
            return None;
        }
        let gx = ((x - self.bounds.top_left_x) / self.cell_size).floor();
        let gy = ((y - self.bounds.bottom_right_y) / self.cell_size).floor();
        if !(gx >= 0.0 && gy >= 0.0) {
            return None;
        }
        let (gx, gy) = (gx as usize, gy as usize);
        if gx >= self.cols || gy >= self.rows {
            return None;
        }
        Some(gy * self.cols + gx)
    }

    /// Column and row of a cell index.
    pub fn cell_coords(&self, cell: usize) -> Option<(usize, usize)> {
        (cell < self.cell_count()).then(|| (cell % self.cols, cell / self.cols))
    }

    /// Valid cells reached from `cell` through `offsets`, in offset order.
    fn offset_cells<'a>(
        &'a self,
        cell: usize,
        offsets: &'a [(i32, i32)],
    ) -> impl Iterator<Item = usize> + 'a {
        let origin = self.cell_coords(cell);
        offsets.iter().filter_map(move |&(dx, dy)| {
            let (cx, cy) = origin?;
            let x = cx as i64 + dx as i64;
            let y = cy as i64 + dy as i64;
            if x < 0 || y < 0 || x >= self.cols as i64 || y >= self.rows as i64 {
                return None;
            }
            Some(y as usize * self.cols + x as usize)
        })
    }

    /// Entries of every in-bounds cell around `cell` at the given offsets.
    ///
    /// Out-of-bounds cells are skipped; an invalid `cell` yields nothing.
    pub fn entries_around<'a>(
        &'a self,
        cell: usize,
        offsets: &'a [(i32, i32)],
    ) -> impl Iterator<Item = &'a GridEntry> + 'a {
        self.offset_cells(cell, offsets)
            .flat_map(move |c| self.cells[c].iter())
    }

    /// Cached vision-window entries for `cell`; empty for an invalid cell.
    pub fn neighbors(&self, cell: usize) -> &[GridEntry] {
        self.neighbor_cache
            .get(cell)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entries registered directly in `cell`.
    pub fn cell(&self, cell: usize) -> &[GridEntry] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bounds(&self) -> &GridBounds {
        &self.bounds
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_count(&self) -> usize {
        self.cols * self.rows
    }

    pub fn neighbor_offsets(&self) -> &[(i32, i32)] {
        &self.neighbor_offsets
    }
}
