use crate::{
    grid::{BackgroundGrid, DISK_NEIGHBORHOOD},
    types::{CellId, EdgeId, Float, Point, PointEdge, PointId, Vertex},
    utils::distance_squared,
};

/// Arena of sampled points, bucketed by background cell.
///
/// Each cell owns a chain of points (`cell_heads` then [Point::next_in_cell]), in insertion order.
/// A cell is `bad` once it holds a point or lies outside of the domain: no sample can be added to it anymore.
#[derive(Debug, Clone)]
pub struct PointCloud {
    pub(crate) points: Vec<Point>,
    cell_heads: Vec<Option<PointId>>,
    cell_tails: Vec<Option<PointId>>,
    bad: Vec<bool>,
    num_bad: usize,
}

impl PointCloud {
    pub fn new(grid: &BackgroundGrid) -> Self {
        let num_cells = grid.num_cells();
        let bad: Vec<bool> = (0..num_cells).map(|c| grid.is_exterior(c)).collect();
        let num_bad = bad.iter().filter(|b| **b).count();
        Self {
            points: Vec::new(),
            cell_heads: vec![None; num_cells],
            cell_tails: vec![None; num_cells],
            bad,
            num_bad,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn point(&self, id: PointId) -> &Point {
        &self.points[id as usize]
    }

    #[inline]
    pub(crate) fn point_mut(&mut self, id: PointId) -> &mut Point {
        &mut self.points[id as usize]
    }

    #[inline]
    pub fn position(&self, id: PointId) -> Vertex {
        self.points[id as usize].position
    }

    #[inline]
    pub fn is_bad(&self, cell: CellId) -> bool {
        self.bad[cell]
    }

    #[inline]
    pub fn num_bad(&self) -> usize {
        self.num_bad
    }

    #[inline]
    pub(crate) fn mark_bad(&mut self, cell: CellId) {
        if !self.bad[cell] {
            self.bad[cell] = true;
            self.num_bad += 1;
        }
    }

    /// Appends a new point at the end of the chain of `cell`, and marks the cell as bad
    pub(crate) fn insert(&mut self, position: Vertex, cell: CellId, on_boundary: bool) -> PointId {
        let id = self.points.len() as PointId;
        self.points.push(Point::new(position, on_boundary));
        match self.cell_tails[cell] {
            Some(tail) => self.points[tail as usize].next_in_cell = Some(id),
            None => self.cell_heads[cell] = Some(id),
        }
        self.cell_tails[cell] = Some(id);
        self.mark_bad(cell);
        id
    }

    /// Points of `cell`, in bucket chain order
    pub fn cell_points(&self, cell: CellId) -> CellPoints<'_> {
        CellPoints {
            points: &self.points,
            next: self.cell_heads[cell],
        }
    }

    /// Points of the cells at `offsets` around `cell`
    pub fn neighborhood_points<'a>(
        &'a self,
        grid: &'a BackgroundGrid,
        cell: CellId,
        offsets: &'a [(i32, i32)],
    ) -> impl Iterator<Item = PointId> + 'a {
        grid.neighbors(cell, offsets)
            .flat_map(move |neighbor| self.cell_points(neighbor))
    }

    /// An existing point within `tolerance_squared` of `position`, if any
    pub fn closest_point(
        &self,
        grid: &BackgroundGrid,
        position: Vertex,
        tolerance_squared: Float,
    ) -> Option<PointId> {
        let cell = grid.cell_of(position)?;
        self.neighborhood_points(grid, cell, &DISK_NEIGHBORHOOD[..9])
            .map(|id| (id, distance_squared(self.position(id), position)))
            .filter(|(_, d2)| *d2 <= tolerance_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    /// Returns `true` if no point of the disk neighborhood of `cell` lies strictly closer than `sqrt(dm2)` to `position`
    pub fn respects_disk(
        &self,
        grid: &BackgroundGrid,
        cell: CellId,
        position: Vertex,
        dm2: Float,
    ) -> bool {
        self.neighborhood_points(grid, cell, &DISK_NEIGHBORHOOD)
            .all(|id| distance_squared(self.position(id), position) >= dm2)
    }

    #[inline]
    pub fn connected(&self, a: PointId, b: PointId) -> bool {
        self.point(a).is_connected_to(b)
    }

    /// `b` can no longer receive new edges from `a`: its ring is final and does not contain `a`
    #[inline]
    pub fn sealed_from(&self, a: PointId, b: PointId) -> bool {
        self.point(b).done && !self.connected(a, b)
    }

    /// Registers the undirected edge `(a, b)` on both of its endpoints.
    ///
    /// An existing edge keeps its tag unless `edge_id` brings one.
    pub(crate) fn add_constraint_edge(&mut self, a: PointId, b: PointId, edge_id: Option<EdgeId>) {
        if a == b {
            return;
        }
        for (from, to) in [(a, b), (b, a)] {
            let edges = &mut self.points[from as usize].edges;
            match edges.iter_mut().find(|e| e.to == to) {
                Some(existing) => {
                    if edge_id.is_some() {
                        existing.edge_id = edge_id;
                    }
                }
                None => edges.push(PointEdge::new(to, edge_id)),
            }
        }
    }
}

/// Iterator over the bucket chain of a cell
pub struct CellPoints<'a> {
    points: &'a [Point],
    next: Option<PointId>,
}
impl<'a> Iterator for CellPoints<'a> {
    type Item = PointId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.points[current as usize].next_in_cell;
        Some(current)
    }
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use crate::{
        domain::Domain, points::PointCloud, rasterizer::rasterize, types::Vertex,
    };

    #[test]
    fn bucket_chain_order_and_bad_cells() {
        let domain =
            Domain::from_flattened(&[0., 0., 1., 0., 1., 1., 0., 1.], &[], &[]).expect("Valid");
        let grid = rasterize(&domain, 0.1).expect("Grid should fit");
        let mut cloud = PointCloud::new(&grid);
        let initially_bad = cloud.num_bad();
        assert_eq!(grid.exterior_cell_count(), initially_bad);

        let p = Vertex::new(0.5, 0.5);
        let cell = grid.cell_of(p).expect("In grid");
        let a = cloud.insert(p, cell, false);
        let b = cloud.insert(p + Vertex::new(0.001, 0.), cell, true);

        assert_eq!(vec![a, b], cloud.cell_points(cell).collect::<Vec<_>>());
        assert!(cloud.is_bad(cell));
        assert_eq!(initially_bad + 1, cloud.num_bad());
        assert_eq!(Some(a), cloud.closest_point(&grid, p, 1e-20));
        assert_eq!(None, cloud.closest_point(&grid, Vertex::new(0.2, 0.2), 1e-20));
    }

    #[test]
    fn disk_test() {
        let domain =
            Domain::from_flattened(&[0., 0., 1., 0., 1., 1., 0., 1.], &[], &[]).expect("Valid");
        let grid = rasterize(&domain, 0.1).expect("Grid should fit");
        let mut cloud = PointCloud::new(&grid);
        let p = Vertex::new(0.5, 0.5);
        cloud.insert(p, grid.cell_of(p).expect("In grid"), false);

        let near = Vertex::new(0.59, 0.5);
        let far = Vertex::new(0.61, 0.5);
        let near_cell = grid.cell_of(near).expect("In grid");
        let far_cell = grid.cell_of(far).expect("In grid");
        assert!(!cloud.respects_disk(&grid, near_cell, near, 0.01));
        assert!(cloud.respects_disk(&grid, far_cell, far, 0.01));
    }

    #[test]
    fn symmetric_edges() {
        let domain =
            Domain::from_flattened(&[0., 0., 1., 0., 1., 1., 0., 1.], &[], &[]).expect("Valid");
        let grid = rasterize(&domain, 0.1).expect("Grid should fit");
        let mut cloud = PointCloud::new(&grid);
        let (pa, pb) = (Vertex::new(0.2, 0.2), Vertex::new(0.3, 0.2));
        let a = cloud.insert(pa, grid.cell_of(pa).expect("In grid"), false);
        let b = cloud.insert(pb, grid.cell_of(pb).expect("In grid"), false);

        cloud.add_constraint_edge(a, b, None);
        cloud.add_constraint_edge(b, a, Some(3));
        cloud.add_constraint_edge(a, b, None);

        assert_eq!(1, cloud.point(a).edges.len());
        assert_eq!(Some(3), cloud.point(a).edges[0].edge_id);
        assert_eq!(Some(3), cloud.point(b).edges[0].edge_id);
        assert!(cloud.connected(a, b) && cloud.connected(b, a));
        assert!(!cloud.sealed_from(a, b));
    }
}
