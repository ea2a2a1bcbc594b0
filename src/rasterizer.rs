use std::collections::VecDeque;

use arrayvec::ArrayVec;
use hashbrown::HashMap;
use tracing::debug;

use crate::{
    domain::Domain,
    grid::BackgroundGrid,
    membership::BlueCell,
    mesher::MeshingError,
    types::{CellId, EdgeId, Float, Vertex},
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

/// Cells closer than this to a closing edge are considered touched by it
pub const RASTER_EPSILON: Float = 1e-10;

/// Closing edges touching a cell. Cells with more edges are [BlueCell::Crowded] anyway.
type CellEdges = (ArrayVec<EdgeId, 2>, usize);

/// Builds the background grid of the domain for the minimal distance `dm`:
/// - marks every cell touched by a boundary or hole edge as blue and resolves its [BlueCell] configuration,
/// - marks every non-blue cell lying outside of the domain as exterior.
///
/// Crack edges are not rasterized: they have no interior side.
pub fn rasterize(domain: &Domain, dm: Float) -> Result<BackgroundGrid, MeshingError> {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "rasterize").entered();

    let (min, max) = domain.bounds();
    let mut grid = BackgroundGrid::new(min, max, dm)?;

    let mut cell_edges: HashMap<CellId, CellEdges> = HashMap::new();
    for (edge_id, edge) in domain.closing_edges().iter().enumerate() {
        for_each_cell_touching_segment(&grid, edge.from, edge.to, |cell| {
            let (edges, count) = cell_edges.entry(cell).or_default();
            let edge_id = edge_id as EdgeId;
            if !edges.contains(&edge_id) {
                *count += 1;
                // Overflow is recorded by the count
                let _ = edges.try_push(edge_id);
            }
        });
    }

    for (cell, (edges, count)) in cell_edges.iter() {
        let center = grid.cell_center(*cell);
        grid.blue[*cell] = true;
        grid.blue_cells
            .insert(*cell, BlueCell::classify(edges, *count, center, domain));
    }

    classify_exterior_cells(&mut grid, domain);

    debug!(
        "Rasterized domain on a {}x{} grid: {} blue cells, {} exterior cells",
        grid.columns,
        grid.rows,
        grid.blue_cells.len(),
        grid.exterior_cell_count()
    );

    Ok(grid)
}

/// Calls `f` on every cell the segment `(a, b)` passes through or passes within [RASTER_EPSILON] of.
///
/// Walks the grid column by column: in each column, the segment's ordinate range is computed on the
/// column's abscissa range (expanded by [RASTER_EPSILON]) and every row in it is visited.
pub(crate) fn for_each_cell_touching_segment<F: FnMut(CellId)>(
    grid: &BackgroundGrid,
    a: Vertex,
    b: Vertex,
    mut f: F,
) {
    let (lo, hi) = if a.x <= b.x { (a, b) } else { (b, a) };
    let s = grid.cell_size;
    let dx = hi.x - lo.x;
    let y_at = |x: Float| {
        if dx <= RASTER_EPSILON {
            None
        } else {
            Some(lo.y + (x - lo.x) * (hi.y - lo.y) / dx)
        }
    };

    let i_min = grid.column_of(lo.x - RASTER_EPSILON);
    let i_max = grid.column_of(hi.x + RASTER_EPSILON);
    for i in i_min..=i_max {
        let column_min = grid.origin.x + i as Float * s - RASTER_EPSILON;
        let column_max = grid.origin.x + (i + 1) as Float * s + RASTER_EPSILON;
        let x0 = column_min.max(lo.x);
        let x1 = column_max.min(hi.x);
        if x0 > x1 {
            continue;
        }
        let (y0, y1) = match (y_at(x0), y_at(x1)) {
            (Some(y0), Some(y1)) => (y0, y1),
            // Vertical segment
            _ => (lo.y, hi.y),
        };
        let (y_min, y_max) = (y0.min(y1), y0.max(y1));
        let j_min = grid.row_of(y_min - RASTER_EPSILON);
        let j_max = grid.row_of(y_max + RASTER_EPSILON);
        for j in j_min..=j_max {
            f(grid.cell_index(i, j));
        }
    }
}

/// Non-blue cells are never crossed by a closing edge, so every 4-connected component of non-blue cells
/// is either entirely inside or entirely outside of the domain. One crossing number test per component decides.
fn classify_exterior_cells(grid: &mut BackgroundGrid, domain: &Domain) {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "classify_exterior_cells").entered();

    let num_cells = grid.num_cells();
    let mut visited = vec![false; num_cells];
    let mut component = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..num_cells {
        if visited[start] || grid.blue[start] {
            continue;
        }
        component.clear();
        visited[start] = true;
        queue.push_back(start);
        while let Some(cell) = queue.pop_front() {
            component.push(cell);
            let (i, j) = grid.cell_coords(cell);
            let mut visit = |ni: usize, nj: usize| {
                let neighbor = grid.cell_index(ni, nj);
                if !visited[neighbor] && !grid.blue[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            };
            if i > 0 {
                visit(i - 1, j);
            }
            if i + 1 < grid.columns {
                visit(i + 1, j);
            }
            if j > 0 {
                visit(i, j - 1);
            }
            if j + 1 < grid.rows {
                visit(i, j + 1);
            }
        }

        if !domain.contains(grid.cell_center(start)) {
            for cell in component.iter() {
                grid.exterior[*cell] = true;
            }
        }
    }
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
