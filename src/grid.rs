use hashbrown::HashMap;

use crate::{
    membership::BlueCell,
    mesher::MeshingError,
    types::{CellId, Float, Vertex},
};

/// Ratio between the cell size and the minimal distance `dm`.
///
/// A cell's diagonal equals `dm`, so a single interior sample covers its whole cell.
pub const CELL_SIZE_FACTOR: Float = std::f64::consts::FRAC_1_SQRT_2;
/// Empty cells added around the domain bounding box, on each side
pub const GRID_MARGIN_CELLS: usize = 3;
/// Upper bound on the number of background cells
pub const MAX_GRID_CELLS: usize = 1 << 31;

/// Cells that may hold a point closer than `dm` to any point of the center cell:
/// the 5x5 block around it, minus its 4 corners.
pub const DISK_NEIGHBORHOOD: [(i32, i32); 21] = [
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
    (-2, -1),
    (-2, 0),
    (-2, 1),
    (2, -1),
    (2, 0),
    (2, 1),
    (-1, -2),
    (0, -2),
    (1, -2),
    (-1, 2),
    (0, 2),
    (1, 2),
];

/// Cells searched for the Delaunay neighbors of a point: the 7x7 block around it, minus its 4 corners.
pub const CDT_NEIGHBORHOOD: [(i32, i32); 45] = [
    (0, 0),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
    (-2, -2),
    (-2, -1),
    (-2, 0),
    (-2, 1),
    (-2, 2),
    (2, -2),
    (2, -1),
    (2, 0),
    (2, 1),
    (2, 2),
    (-1, -2),
    (0, -2),
    (1, -2),
    (-1, 2),
    (0, 2),
    (1, 2),
    (-3, -2),
    (-3, -1),
    (-3, 0),
    (-3, 1),
    (-3, 2),
    (3, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (3, 2),
    (-2, -3),
    (-1, -3),
    (0, -3),
    (1, -3),
    (2, -3),
    (-2, 3),
    (-1, 3),
    (0, 3),
    (1, 3),
    (2, 3),
];

/// Uniform background grid covering the domain.
///
/// Cells are addressed by `(i, j)`, `i` along x and `j` along y, flattened as `i * rows + j`.
/// Read-only once built by [crate::rasterizer::rasterize].
#[derive(Debug, Clone)]
pub struct BackgroundGrid {
    pub origin: Vertex,
    pub cell_size: Float,
    pub columns: usize,
    pub rows: usize,
    /// Cells touched by a boundary or hole edge
    pub(crate) blue: Vec<bool>,
    /// Cells lying entirely outside of the domain
    pub(crate) exterior: Vec<bool>,
    /// Interior test of each blue cell
    pub(crate) blue_cells: HashMap<CellId, BlueCell>,
}

impl BackgroundGrid {
    /// Empty grid sized for the bounding box `(min, max)`, expanded by [GRID_MARGIN_CELLS] on each side
    pub(crate) fn new(min: Vertex, max: Vertex, dm: Float) -> Result<Self, MeshingError> {
        let cell_size = dm * CELL_SIZE_FACTOR;
        let margin = GRID_MARGIN_CELLS as Float * cell_size;
        let origin = min - Vertex::splat(margin);
        let extent = (max - min) + Vertex::splat(2. * margin);

        let columns = (extent.x / cell_size).ceil();
        let rows = (extent.y / cell_size).ceil();
        let cells = columns * rows;
        if !cells.is_finite() || cells > MAX_GRID_CELLS as Float {
            return Err(MeshingError::GridTooLarge { cells });
        }
        let (columns, rows) = (columns as usize, rows as usize);
        let num_cells = columns * rows;

        Ok(Self {
            origin,
            cell_size,
            columns,
            rows,
            blue: vec![false; num_cells],
            exterior: vec![false; num_cells],
            blue_cells: HashMap::new(),
        })
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.columns * self.rows
    }

    #[inline]
    pub fn cell_index(&self, i: usize, j: usize) -> CellId {
        i * self.rows + j
    }

    #[inline]
    pub fn cell_coords(&self, cell: CellId) -> (usize, usize) {
        (cell / self.rows, cell % self.rows)
    }

    /// Column of the abscissa `x`, clamped to the grid
    #[inline]
    pub(crate) fn column_of(&self, x: Float) -> usize {
        let i = ((x - self.origin.x) / self.cell_size).floor();
        i.clamp(0., (self.columns - 1) as Float) as usize
    }

    /// Row of the ordinate `y`, clamped to the grid
    #[inline]
    pub(crate) fn row_of(&self, y: Float) -> usize {
        let j = ((y - self.origin.y) / self.cell_size).floor();
        j.clamp(0., (self.rows - 1) as Float) as usize
    }

    /// Cell containing `p`, [None] if `p` is outside of the grid
    pub fn cell_of(&self, p: Vertex) -> Option<CellId> {
        let local = (p - self.origin) / self.cell_size;
        if !(local.x >= 0. && local.y >= 0.) {
            return None;
        }
        let (i, j) = (local.x.floor() as usize, local.y.floor() as usize);
        if i >= self.columns || j >= self.rows {
            return None;
        }
        Some(self.cell_index(i, j))
    }

    #[inline]
    pub fn cell_min(&self, cell: CellId) -> Vertex {
        let (i, j) = self.cell_coords(cell);
        self.origin + Vertex::new(i as Float, j as Float) * self.cell_size
    }

    #[inline]
    pub fn cell_center(&self, cell: CellId) -> Vertex {
        self.cell_min(cell) + Vertex::splat(0.5 * self.cell_size)
    }

    /// Corners of the cell, counter-clockwise from its min corner
    pub fn cell_square(&self, cell: CellId) -> [Vertex; 4] {
        let min = self.cell_min(cell);
        let s = self.cell_size;
        [
            min,
            min + Vertex::new(s, 0.),
            min + Vertex::new(s, s),
            min + Vertex::new(0., s),
        ]
    }

    /// Cells at the given `(di, dj)` offsets from `cell`, skipping the ones outside of the grid
    pub fn neighbors<'a>(
        &'a self,
        cell: CellId,
        offsets: &'a [(i32, i32)],
    ) -> impl Iterator<Item = CellId> + 'a {
        let (i, j) = self.cell_coords(cell);
        offsets.iter().filter_map(move |&(di, dj)| {
            let ni = i as i64 + di as i64;
            let nj = j as i64 + dj as i64;
            if ni < 0 || nj < 0 || ni >= self.columns as i64 || nj >= self.rows as i64 {
                None
            } else {
                Some(self.cell_index(ni as usize, nj as usize))
            }
        })
    }

    #[inline]
    pub fn is_blue(&self, cell: CellId) -> bool {
        self.blue[cell]
    }

    #[inline]
    pub fn is_exterior(&self, cell: CellId) -> bool {
        self.exterior[cell]
    }

    #[inline]
    pub fn blue_cell(&self, cell: CellId) -> Option<&BlueCell> {
        self.blue_cells.get(&cell)
    }

    /// Count of cells lying entirely outside of the domain
    pub fn exterior_cell_count(&self) -> usize {
        self.exterior.iter().filter(|e| **e).count()
    }
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
