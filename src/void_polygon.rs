use arrayvec::ArrayVec;
use rand::Rng;

use crate::{
    grid::BackgroundGrid,
    membership::HalfPlane,
    types::{CellId, Float, PointId, Vertex},
    utils::{
        circles_intersection, clockwise_angle, distance_squared, point_in_convex_hull,
        polygon_signed_area, segment_circle_intersections, SNAP_DISTANCE_SQUARED,
    },
};

#[cfg(feature = "more_profile_traces")]
use tracing::{span, Level};

/// Arc crossings closer than this angle to an arc end are ignored
const ANGLE_EPSILON: Float = 1e-12;
/// Void regions smaller than this fraction of a cell are ignored
pub const MIN_VOID_AREA_FRACTION: Float = 1e-10;

/// Reasons a void region is abandoned
#[derive(thiserror::Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CutFailure {
    #[error("void region split into more than {max} polygons")]
    TooManyPolygons { max: usize },
    #[error("void region boundary walk did not converge")]
    NonConvergent,
    #[error("void region clipped by more than {max} forbidding disks")]
    TooManyCuts { max: usize },
}

/// Boundary arc of a forbidding disk
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArcEdge {
    /// Point at the center of the disk
    pub disk: PointId,
    pub center: Vertex,
}

/// Vertex of a [VoidPolygon]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PolyPoint {
    pub position: Vertex,
    /// The edge leaving this vertex: a straight segment, or an arc of a forbidding disk walked clockwise around its center
    pub arc: Option<ArcEdge>,
}
impl PolyPoint {
    #[inline]
    pub fn corner(position: Vertex) -> Self {
        Self {
            position,
            arc: None,
        }
    }
}

/// Counter-clockwise ring bounding a part of a cell not covered by any forbidding disk.
///
/// Edges are straight (cell sides and domain edges) or arcs of forbidding disks. Arcs bulge towards the inside
/// of the region, so the straight ring through the vertices contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct VoidPolygon {
    pub cell: CellId,
    pub ring: Vec<PolyPoint>,
}

impl VoidPolygon {
    /// Straight-edged polygon, [None] if it has less than 3 vertices
    pub fn from_vertices(cell: CellId, vertices: &[Vertex]) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        Some(Self {
            cell,
            ring: vertices.iter().copied().map(PolyPoint::corner).collect(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Area of the region, arcs included. `radius` is the radius of the forbidding disks.
    pub fn area(&self, radius: Float) -> Float {
        let chord_area = polygon_signed_area(self.ring.iter().map(|p| p.position));
        let n = self.ring.len();
        let segments_area: Float = (0..n)
            .filter_map(|k| {
                let from = &self.ring[k];
                let to = self.ring[(k + 1) % n].position;
                from.arc.map(|arc| {
                    let theta = clockwise_angle(arc.center, from.position, to);
                    0.5 * radius * radius * (theta - theta.sin())
                })
            })
            .sum();
        chord_area - segments_area
    }

    /// Area of the region is at most [MIN_VOID_AREA_FRACTION] of a cell of side `cell_size`
    #[inline]
    pub fn is_negligible(&self, radius: Float, cell_size: Float) -> bool {
        self.len() < 3 || self.area(radius) <= MIN_VOID_AREA_FRACTION * cell_size * cell_size
    }

    /// Random convex combination of the ring vertices, inside the hull of the ring
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vertex {
        let mut weighted = Vertex::ZERO;
        let mut total = 0.;
        for p in self.ring.iter() {
            let u = rng.gen::<Float>();
            weighted += u * p.position;
            total += u;
        }
        if total <= 0. {
            return self.ring[0].position;
        }
        let p = weighted / total;
        // Straight rings are convex: cell squares clipped by half-planes
        debug_assert!(
            self.ring.iter().any(|v| v.arc.is_some())
                || point_in_convex_hull(&self.positions(), p)
        );
        p
    }

    pub fn positions(&self) -> Vec<Vertex> {
        self.ring.iter().map(|p| p.position).collect()
    }
}

/// Parts of `cell` lying in the domain interior, one polygon per convex region of its blue configuration.
///
/// Cells that are not blue, or whose configuration has no convex decomposition, yield their whole square.
/// Slivers left by a domain edge lying on a cell side are dropped.
pub fn cell_regions(grid: &BackgroundGrid, cell: CellId) -> ArrayVec<VoidPolygon, 2> {
    let square = grid.cell_square(cell);
    let min_area = MIN_VOID_AREA_FRACTION * grid.cell_size * grid.cell_size;
    let mut polygons = ArrayVec::new();
    match grid.blue_cell(cell).and_then(|b| b.interior_regions()) {
        Some(regions) => {
            for region in regions.iter() {
                let mut ring = square.to_vec();
                for plane in region.iter() {
                    ring = clip_half_plane(&ring, plane);
                }
                if polygon_signed_area(ring.iter().copied()) <= min_area {
                    continue;
                }
                if let Some(polygon) = VoidPolygon::from_vertices(cell, &ring) {
                    polygons.push(polygon);
                }
            }
        }
        None => {
            if let Some(polygon) = VoidPolygon::from_vertices(cell, &square) {
                polygons.push(polygon);
            }
        }
    }
    polygons
}

/// Sutherland-Hodgman clipping of a straight ring by a half-plane
pub fn clip_half_plane(ring: &[Vertex], plane: &HalfPlane) -> Vec<Vertex> {
    let mut clipped = Vec::with_capacity(ring.len() + 1);
    let n = ring.len();
    for k in 0..n {
        let (p, q) = (ring[k], ring[(k + 1) % n]);
        let (sp, sq) = (plane.side(p), plane.side(q));
        if sp >= 0. {
            clipped.push(p);
        }
        if (sp > 0. && sq < 0.) || (sp < 0. && sq > 0.) {
            let t = sp / (sp - sq);
            clipped.push(p + (q - p) * t);
        }
    }
    clipped
}

/// Removes the forbidding disk of radius `radius` centered on `disk` from `polygon`.
///
/// Returns the remaining regions: the untouched polygon, nothing when the disk covers it, or the rings
/// built by [split_polygon].
pub fn cut_polygon(
    polygon: &VoidPolygon,
    disk: PointId,
    center: Vertex,
    radius: Float,
    max_polygons: usize,
) -> Result<Vec<VoidPolygon>, CutFailure> {
    #[cfg(feature = "more_profile_traces")]
    let _span = span!(Level::TRACE, "cut_polygon").entered();

    let r2 = radius * radius;
    let n = polygon.len();

    // Ring vertices interleaved with the crossings of the circle
    let mut nodes: Vec<PolyPoint> = Vec::with_capacity(n + 4);
    for k in 0..n {
        let from = polygon.ring[k];
        let to = polygon.ring[(k + 1) % n].position;
        nodes.push(from);
        for crossing in edge_crossings(&from, to, center, r2) {
            nodes.push(PolyPoint {
                position: crossing,
                arc: from.arc,
            });
        }
    }
    // A duplicate keeps the edge leaving the last copy
    nodes.dedup_by(|later, earlier| {
        let same = distance_squared(later.position, earlier.position) <= SNAP_DISTANCE_SQUARED;
        if same {
            earlier.arc = later.arc;
        }
        same
    });
    while nodes.len() > 1
        && distance_squared(nodes[0].position, nodes[nodes.len() - 1].position)
            <= SNAP_DISTANCE_SQUARED
    {
        nodes.pop();
    }
    // Nothing left but a point or a segment
    if nodes.len() < 3 {
        return Ok(Vec::new());
    }

    let m = nodes.len();
    let inside: Vec<bool> = (0..m)
        .map(|k| {
            let mid = piece_midpoint(&nodes[k], nodes[(k + 1) % m].position, radius);
            distance_squared(mid, center) < r2
        })
        .collect();

    if inside.iter().all(|i| !*i) {
        return Ok(vec![polygon.clone()]);
    }
    if inside.iter().all(|i| *i) {
        return Ok(Vec::new());
    }

    let cut = ArcEdge { disk, center };
    Ok(split_polygon(&nodes, &inside, cut, max_polygons)?
        .into_iter()
        .map(|ring| VoidPolygon {
            cell: polygon.cell,
            ring,
        })
        .collect())
}

/// Extracts the rings left once the pieces of `nodes` flagged `inside` the disk `cut` are removed.
///
/// Each piece `k` goes from `nodes[k]` to the next node. Every ring leaves the disk at an exit node, follows the
/// outside pieces up to an entry node, then follows the disk boundary clockwise to the next exit node.
pub fn split_polygon(
    nodes: &[PolyPoint],
    inside: &[bool],
    cut: ArcEdge,
    max_polygons: usize,
) -> Result<Vec<Vec<PolyPoint>>, CutFailure> {
    let n = nodes.len();
    let previous_inside = |k: usize| inside[(k + n - 1) % n];
    let is_entry = |k: usize| !previous_inside(k) && inside[k];
    let exits: Vec<usize> = (0..n).filter(|k| previous_inside(*k) && !inside[*k]).collect();

    let mut visited = vec![false; n];
    let mut rings = Vec::new();
    let max_steps = 2 * n + 2;
    for &start in exits.iter() {
        if visited[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut k = start;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > max_steps {
                return Err(CutFailure::NonConvergent);
            }
            if is_entry(k) {
                let entry = nodes[k].position;
                ring.push(PolyPoint {
                    position: entry,
                    arc: Some(cut),
                });
                k = exits
                    .iter()
                    .copied()
                    .map(|x| (x, clockwise_angle(cut.center, entry, nodes[x].position)))
                    .filter(|(_, angle)| *angle > ANGLE_EPSILON)
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(x, _)| x)
                    .ok_or(CutFailure::NonConvergent)?;
            } else {
                if visited[k] {
                    return Err(CutFailure::NonConvergent);
                }
                visited[k] = true;
                ring.push(nodes[k]);
                k = (k + 1) % n;
            }
            if k == start {
                break;
            }
        }
        rings.push(ring);
        if rings.len() > max_polygons {
            return Err(CutFailure::TooManyPolygons { max: max_polygons });
        }
    }
    Ok(rings)
}

/// Crossings of the circle `(center, r2)` with the edge leaving `from`, ordered along the edge
fn edge_crossings(from: &PolyPoint, to: Vertex, center: Vertex, r2: Float) -> ArrayVec<Vertex, 2> {
    match from.arc {
        None => segment_circle_intersections(from.position, to, center, r2)
            .into_iter()
            .map(|t| from.position + (to - from.position) * t)
            .collect(),
        Some(arc) => {
            let Some((left, right)) = circles_intersection(arc.center, center, r2) else {
                return ArrayVec::new();
            };
            let sweep = clockwise_angle(arc.center, from.position, to);
            let mut hits: ArrayVec<(Float, Vertex), 2> = [left, right]
                .into_iter()
                .map(|p| (clockwise_angle(arc.center, from.position, p), p))
                .filter(|(angle, _)| *angle > ANGLE_EPSILON && *angle < sweep - ANGLE_EPSILON)
                .collect();
            hits.sort_by(|a, b| a.0.total_cmp(&b.0));
            hits.into_iter().map(|(_, p)| p).collect()
        }
    }
}

/// Middle of the edge leaving `from`, on the arc for curved edges
fn piece_midpoint(from: &PolyPoint, to: Vertex, radius: Float) -> Vertex {
    match from.arc {
        None => 0.5 * (from.position + to),
        Some(arc) => {
            let offset = from.position - arc.center;
            let half_sweep = 0.5 * clockwise_angle(arc.center, from.position, to);
            let angle = offset.y.atan2(offset.x) - half_sweep;
            arc.center + radius * Vertex::new(angle.cos(), angle.sin())
        }
    }
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
