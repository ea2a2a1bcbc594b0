use hashbrown::HashMap;
use tracing::debug;

use crate::{
    domain::Domain,
    grid::{BackgroundGrid, CDT_NEIGHBORHOOD},
    points::PointCloud,
    rasterizer::for_each_cell_touching_segment,
    types::{CellId, EdgeId, Float, PointEdge, PointId, Vertex},
    utils::{
        area_triangle, circumcircle, clockwise_angle, crossing_segments, distance_squared,
        AREA_EPSILON,
    },
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

#[cfg(feature = "progress_log")]
use tracing::info;

#[cfg(feature = "debug_context")]
use crate::debug::{DebugContext, EventInfo, Phase};

/// Candidates farther than `sqrt(CANDIDATE_DISTANCE_FACTOR) * dm` from a point are never its neighbors
pub const CANDIDATE_DISTANCE_FACTOR: Float = 6.;
const CANDIDATE_DISTANCE_TOLERANCE: Float = 1e-6;

/// Input edges (boundary, holes and cracks) touching each cell
pub(crate) struct InputEdgeIndex {
    cells: HashMap<CellId, Vec<EdgeId>>,
}

impl InputEdgeIndex {
    pub(crate) fn new(domain: &Domain, grid: &BackgroundGrid) -> Self {
        let mut cells: HashMap<CellId, Vec<EdgeId>> = HashMap::new();
        for (edge_id, edge) in domain.edges().iter().enumerate() {
            for_each_cell_touching_segment(grid, edge.from, edge.to, |cell| {
                cells.entry(cell).or_default().push(edge_id as EdgeId);
            });
        }
        Self { cells }
    }

    /// Returns `true` if the segment `(a, b)` properly crosses an input edge
    pub(crate) fn crosses(&self, domain: &Domain, grid: &BackgroundGrid, a: Vertex, b: Vertex) -> bool {
        let mut crossing = false;
        for_each_cell_touching_segment(grid, a, b, |cell| {
            if crossing {
                return;
            }
            if let Some(edges) = self.cells.get(&cell) {
                crossing = edges.iter().any(|id| {
                    let edge = domain.edge(*id);
                    crossing_segments(a, b, edge.from, edge.to)
                });
            }
        });
        crossing
    }
}

/// Builds the neighbor ring of every point, visiting cells in index order and points in bucket chain order.
///
/// Each ring is a star of candidate neighbors around the point, pruned so that no candidate edge crosses a
/// committed edge and every remaining edge is locally Delaunay. Edges between consecutive ring entries are
/// committed too, so the points visited later agree with the ones already finalized.
pub fn build_local_triangulation(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &mut PointCloud,
    dm: Float,
    #[cfg(feature = "debug_context")] debug_context: &mut DebugContext,
) {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "build_local_triangulation").entered();

    let index = InputEdgeIndex::new(domain, grid);
    let max_distance_squared = CANDIDATE_DISTANCE_FACTOR * dm * dm + CANDIDATE_DISTANCE_TOLERANCE;

    let mut candidates = Vec::new();
    let mut chain = Vec::new();
    let mut _processed = 0;
    for cell in 0..grid.num_cells() {
        chain.clear();
        chain.extend(cloud.cell_points(cell));
        for &qi in chain.iter() {
            #[cfg(feature = "debug_context")]
            {
                if debug_context.advance_step() {
                    return;
                }
            }

            gather_candidates(
                domain,
                grid,
                cloud,
                &index,
                qi,
                cell,
                max_distance_squared,
                &mut candidates,
            );
            let ring = build_ring(domain, cloud, qi, &candidates);
            finalize_ring(domain, grid, cloud, &index, qi, ring);

            #[cfg(feature = "debug_context")]
            {
                let mut changed_ids = vec![qi];
                changed_ids.extend(cloud.point(qi).edges.iter().map(|e| e.to));
                debug_context.push_snapshot_event(
                    Phase::LocalTriangulation,
                    EventInfo::RingBuilt(qi),
                    cloud,
                    &changed_ids,
                    &[],
                );
            }

            _processed += 1;
            #[cfg(feature = "progress_log")]
            {
                if _processed % ((cloud.len() / 50) + 1) == 0 {
                    let progress = 100. * _processed as f32 / cloud.len() as f32;
                    info!(
                        "Local triangulation progress, {}%: {}/{}",
                        progress,
                        _processed,
                        cloud.len()
                    );
                }
            }
        }
    }

    debug!(
        "Local triangulation built the rings of {} points",
        cloud.points.iter().filter(|p| p.done).count()
    );
}

/// Candidate neighbors of `qi`: its committed neighbors first, then the points of its neighborhood that can
/// still be connected to it.
#[allow(clippy::too_many_arguments)]
fn gather_candidates(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &PointCloud,
    index: &InputEdgeIndex,
    qi: PointId,
    cell: CellId,
    max_distance_squared: Float,
    candidates: &mut Vec<PointId>,
) {
    candidates.clear();
    let center = cloud.position(qi);
    for edge in cloud.point(qi).edges.iter() {
        if !candidates.contains(&edge.to) {
            candidates.push(edge.to);
        }
    }
    for qj in cloud.neighborhood_points(grid, cell, &CDT_NEIGHBORHOOD) {
        if qj == qi || candidates.contains(&qj) || cloud.sealed_from(qi, qj) {
            continue;
        }
        let position = cloud.position(qj);
        if distance_squared(center, position) > max_distance_squared {
            continue;
        }
        if index.crosses(domain, grid, center, position) {
            continue;
        }
        candidates.push(qj);
    }
}

/// Counter-clockwise angle in `[0, 2PI[` from `from` to `to` around `center`
#[inline]
fn ccw_angle(center: Vertex, from: Vertex, to: Vertex) -> Float {
    clockwise_angle(center, to, from)
}

#[derive(Debug, Copy, Clone)]
struct RingEntry {
    id: PointId,
    position: Vertex,
    /// Squared distance to the center
    lsq: Float,
    /// Already connected to the center: never removed
    connected: bool,
}

/// Star-shaped ring of candidate neighbors around a point, counter-clockwise
#[derive(Debug, Clone)]
struct NeighborRing {
    center: Vertex,
    entries: Vec<RingEntry>,
    closed: bool,
    /// Open ring spanning the interior side of a boundary point, from its next to its previous boundary neighbor
    anchored: bool,
}

impl NeighborRing {
    fn new(center: Vertex) -> Self {
        Self {
            center,
            entries: Vec::new(),
            closed: false,
            anchored: false,
        }
    }

    fn anchored(center: Vertex, next: RingEntry, previous: RingEntry) -> Self {
        Self {
            center,
            entries: vec![next, previous],
            closed: false,
            anchored: true,
        }
    }

    fn entry(&self, id: PointId, position: Vertex, connected: bool) -> RingEntry {
        RingEntry {
            id,
            position,
            lsq: distance_squared(self.center, position),
            connected,
        }
    }

    fn contains(&self, id: PointId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Inserts `entry` at its angular position. Returns `false` if it was dropped.
    fn insert(&mut self, entry: RingEntry) -> bool {
        let c = self.center;
        let p = entry.position;

        // Same direction as an existing entry: the closest one stays
        if let Some(k) = self.entries.iter().position(|e| {
            area_triangle(c, e.position, p).abs() <= AREA_EPSILON
                && (e.position - c).dot(p - c) > 0.
        }) {
            let existing = self.entries[k];
            let replace = !existing.connected && (entry.connected || entry.lsq < existing.lsq);
            if replace {
                self.entries[k] = entry;
            }
            return replace;
        }

        match self.entries.len() {
            0 => {
                self.entries.push(entry);
                return true;
            }
            1 => {
                if area_triangle(c, self.entries[0].position, p) < 0. {
                    self.entries.insert(0, entry);
                } else {
                    self.entries.push(entry);
                }
                return true;
            }
            _ => (),
        }

        let n = self.entries.len();
        let wedges = if self.closed { n } else { n - 1 };
        for k in 0..wedges {
            let (a, b) = (self.entries[k].position, self.entries[(k + 1) % n].position);
            if ccw_angle(c, a, p) < ccw_angle(c, a, b) {
                self.entries.insert(k + 1, entry);
                return true;
            }
        }
        if self.closed || self.anchored {
            return false;
        }

        // Outside of the open ring: extend it, or close it when both new wedges are convex
        let (first, last) = (self.entries[0].position, self.entries[n - 1].position);
        let area_start = area_triangle(c, p, first);
        let area_end = area_triangle(c, last, p);
        if area_start > AREA_EPSILON && area_end > AREA_EPSILON {
            self.entries.push(entry);
            self.closed = true;
        } else if area_start > AREA_EPSILON {
            self.entries.insert(0, entry);
        } else if area_end > AREA_EPSILON {
            self.entries.push(entry);
        } else {
            return false;
        }
        true
    }

    /// Inserts `entry` by its angle from the first entry, whatever the wedges
    fn insert_by_angle(&mut self, entry: RingEntry) {
        let Some(first) = self.entries.first().map(|e| e.position) else {
            self.entries.push(entry);
            return;
        };
        let angle = ccw_angle(self.center, first, entry.position);
        let k = (1..self.entries.len())
            .find(|k| angle < ccw_angle(self.center, first, self.entries[*k].position))
            .unwrap_or(self.entries.len());
        self.entries.insert(k, entry);
    }

    /// Removes the entries whose edge to the center would cross a committed edge of another entry
    fn prune_constraints(&mut self, cloud: &PointCloud, qi: PointId) {
        let c = self.center;
        let constraints: Vec<(Vertex, Vertex)> = self
            .entries
            .iter()
            .flat_map(|e| {
                cloud
                    .point(e.id)
                    .edges
                    .iter()
                    .filter(|edge| edge.to != qi)
                    .map(move |edge| (e.position, cloud.position(edge.to)))
            })
            .collect();
        self.entries.retain(|e| {
            e.connected
                || !constraints
                    .iter()
                    .any(|(a, b)| crossing_segments(c, e.position, *a, *b))
        });
        if self.entries.len() < 3 {
            self.closed = false;
        }
    }

    /// Removes the entries lying outside of the circumcircle of the center and their two ring neighbors,
    /// until none is left. The ends of an open ring are kept.
    fn prune_delaunay(&mut self) {
        let c = self.center;
        loop {
            let mut removed = false;
            let mut k = if self.closed { 0 } else { 1 };
            while self.entries.len() >= 3 {
                let n = self.entries.len();
                let end = if self.closed { n } else { n - 1 };
                if k >= end {
                    break;
                }
                let (prev, current, next) = (
                    self.entries[(k + n - 1) % n],
                    self.entries[k],
                    self.entries[(k + 1) % n],
                );
                let closest = current.lsq < prev.lsq && current.lsq < next.lsq;
                if !current.connected
                    && !closest
                    && area_triangle(c, prev.position, next.position) >= -AREA_EPSILON
                {
                    if let Some((circle_center, r2)) =
                        circumcircle(c, prev.position, next.position)
                    {
                        if distance_squared(current.position, circle_center) > r2 {
                            self.entries.remove(k);
                            removed = true;
                            continue;
                        }
                    }
                }
                k += 1;
            }
            if !removed {
                break;
            }
        }
        if self.entries.len() < 3 {
            self.closed = false;
        }
    }

    /// Consecutive entries, the closing pair included for a closed ring
    fn consecutive_pairs(&self) -> impl Iterator<Item = (RingEntry, RingEntry)> + '_ {
        let n = self.entries.len();
        let pairs = match (self.closed, n) {
            (_, 0) | (_, 1) => 0,
            (true, _) => n,
            (false, _) => n - 1,
        };
        (0..pairs).map(move |k| (self.entries[k], self.entries[(k + 1) % n]))
    }
}

/// Next and previous neighbors of a point along the single boundary or hole loop it lies on
fn loop_neighbors(domain: &Domain, cloud: &PointCloud, qi: PointId) -> Option<(PointId, PointId)> {
    let point = cloud.point(qi);
    if !point.on_boundary {
        return None;
    }
    let (mut next, mut previous) = (None, None);
    for edge in point.edges.iter() {
        let Some(edge_id) = edge.edge_id else {
            continue;
        };
        let input = domain.edge(edge_id);
        if !input.is_closing() {
            continue;
        }
        let slot = if (cloud.position(edge.to) - point.position).dot(input.to - input.from) > 0. {
            &mut next
        } else {
            &mut previous
        };
        if slot.is_some() {
            // Several loops meet here
            return None;
        }
        *slot = Some(edge.to);
    }
    next.zip(previous)
}

fn build_ring(domain: &Domain, cloud: &PointCloud, qi: PointId, candidates: &[PointId]) -> NeighborRing {
    let center = cloud.position(qi);
    let mut ring = NeighborRing::new(center);
    if let Some((next, previous)) = loop_neighbors(domain, cloud, qi) {
        ring = NeighborRing::anchored(
            center,
            ring.entry(next, cloud.position(next), true),
            ring.entry(previous, cloud.position(previous), true),
        );
    }

    for &qj in candidates.iter() {
        if ring.contains(qj) {
            continue;
        }
        let connected = cloud.connected(qi, qj);
        let entry = ring.entry(qj, cloud.position(qj), connected);
        if !ring.insert(entry) && connected {
            ring.insert_by_angle(entry);
        }
    }

    ring.prune_constraints(cloud, qi);
    ring.prune_delaunay();
    ring
}

/// Commits the edges of the ring and stores it as the ordered edges of `qi`
fn finalize_ring(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &mut PointCloud,
    index: &InputEdgeIndex,
    qi: PointId,
    mut ring: NeighborRing,
) {
    let center = ring.center;
    let pairs: Vec<(RingEntry, RingEntry)> = ring.consecutive_pairs().collect();
    for (a, b) in pairs {
        if area_triangle(center, a.position, b.position) <= AREA_EPSILON
            || cloud.sealed_from(a.id, b.id)
            || cloud.sealed_from(b.id, a.id)
            || index.crosses(domain, grid, a.position, b.position)
        {
            continue;
        }
        cloud.add_constraint_edge(a.id, b.id, None);
    }

    // A closed ring starts with a boundary edge
    if ring.closed {
        let point = cloud.point(qi);
        if let Some(start) = ring.entries.iter().position(|e| {
            point
                .edge_to(e.id)
                .is_some_and(|edge| edge.is_constrained())
        }) {
            ring.entries.rotate_left(start);
        }
    }

    for entry in ring.entries.iter() {
        cloud.add_constraint_edge(qi, entry.id, None);
    }
    let edges: Vec<PointEdge> = ring
        .entries
        .iter()
        .map(|entry| {
            let edge_id = cloud.point(qi).edge_to(entry.id).and_then(|e| e.edge_id);
            PointEdge::new(entry.id, edge_id)
        })
        .collect();

    let point = cloud.point_mut(qi);
    point.edges = edges;
    point.done = true;
    point.closed_ring = ring.closed;
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
