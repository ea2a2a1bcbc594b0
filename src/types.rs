use glam::{DVec2, Vec2};

/// The float type used in the algorithm's computations
pub type Float = f64;
/// The vertex type used in the algorithm's computations
pub type Vertex = DVec2;

#[cfg(not(feature = "u64_indexes"))]
pub type IndexType = u32;
#[cfg(feature = "u64_indexes")]
pub type IndexType = u64;

/// Index of a sampled point in the point arena
pub type PointId = IndexType;
/// Index of an input segment: outer boundary edges first, then hole edges, then crack edges
pub type EdgeId = IndexType;
/// Flattened index of a background grid cell
pub type CellId = usize;

/// Defines a simple 2d point, accepted as input by [crate::mesher::sample_domain_from_vertices]
pub trait Vertex2d: Clone + Copy + Sized {
    fn x(self) -> Float;
    fn y(self) -> Float;

    #[inline(always)]
    fn to_vertex(self) -> Vertex {
        Vertex::new(self.x(), self.y())
    }
}

impl Vertex2d for Vec2 {
    #[inline(always)]
    fn x(self) -> Float {
        self.x as Float
    }

    #[inline(always)]
    fn y(self) -> Float {
        self.y as Float
    }
}
impl Vertex2d for DVec2 {
    #[inline(always)]
    fn x(self) -> Float {
        self.x
    }

    #[inline(always)]
    fn y(self) -> Float {
        self.y
    }
}
impl Vertex2d for [Float; 2] {
    #[inline(always)]
    fn x(self) -> Float {
        self[0]
    }

    #[inline(always)]
    fn y(self) -> Float {
        self[1]
    }
}

/// A directed link from a point to one of its neighbors in the final graph.
///
/// `edge_id` is set when the link lies on an input boundary, hole or crack segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PointEdge {
    pub to: PointId,
    pub edge_id: Option<EdgeId>,
}
impl PointEdge {
    #[inline]
    pub fn new(to: PointId, edge_id: Option<EdgeId>) -> Self {
        Self { to, edge_id }
    }

    #[inline]
    pub fn is_constrained(&self) -> bool {
        self.edge_id.is_some()
    }
}

/// A sampled vertex, owned by the grid cell bucket it was inserted into.
#[derive(Debug, Clone)]
pub struct Point {
    pub position: Vertex,
    /// Next point in the same cell bucket
    pub next_in_cell: Option<PointId>,
    /// Committed edges, then the ordered neighbor ring once `done`
    pub edges: Vec<PointEdge>,
    /// Exact sample of an input boundary, hole or crack polyline
    pub on_boundary: bool,
    /// Neighbor ring finalized
    pub done: bool,
    /// The finalized ring goes all the way around the point
    pub closed_ring: bool,
}
impl Point {
    pub(crate) fn new(position: Vertex, on_boundary: bool) -> Self {
        Self {
            position,
            next_in_cell: None,
            edges: Vec::new(),
            on_boundary,
            done: false,
            closed_ring: false,
        }
    }

    #[inline]
    pub fn edge_to(&self, other: PointId) -> Option<&PointEdge> {
        self.edges.iter().find(|e| e.to == other)
    }

    #[inline]
    pub fn is_connected_to(&self, other: PointId) -> bool {
        self.edge_to(other).is_some()
    }
}
