use arrayvec::ArrayVec;

use crate::{
    domain::Domain,
    types::{EdgeId, Float, Vertex},
    utils::{
        area_triangle, closest_point_on_segment, distance_squared, AREA_EPSILON,
        SNAP_DISTANCE_SQUARED,
    },
};

/// The region on the left of an oriented line
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HalfPlane {
    pub origin: Vertex,
    pub direction: Vertex,
}
impl HalfPlane {
    #[inline]
    pub fn from_edge(from: Vertex, to: Vertex) -> Self {
        Self {
            origin: from,
            direction: to - from,
        }
    }

    /// Positive on the left of the line
    #[inline]
    pub fn side(&self, p: Vertex) -> Float {
        self.direction.perp_dot(p - self.origin)
    }

    #[inline]
    pub fn contains(&self, p: Vertex) -> bool {
        self.side(p) > 0.
    }

    /// The half-plane on the other side of the same line
    #[inline]
    pub fn complement(&self) -> Self {
        Self {
            origin: self.origin,
            direction: -self.direction,
        }
    }
}

/// A convex region defined as the intersection of up to two half-planes
pub type ConvexRegion = ArrayVec<HalfPlane, 2>;

/// How the closing edges crossing a blue cell split it into interior and exterior parts.
///
/// Resolved once per cell by the rasterizer, then used by both sampling modes.
#[derive(Debug, Clone, PartialEq)]
pub enum BlueCell {
    /// A single edge: the interior is on its left
    OneEdge { edge: EdgeId, side: HalfPlane },
    /// Two consecutive edges `a -> b -> c` meeting at the corner `b`
    ManifoldTwoEdge {
        edges: [EdgeId; 2],
        incoming: HalfPlane,
        outgoing: HalfPlane,
        /// The interior angle at `b` is lower than PI
        convex: bool,
    },
    /// Two consecutive edges whose corner is (nearly) flat, handled as the single edge `a -> c`
    FlatCorner { edges: [EdgeId; 2], side: HalfPlane },
    /// Two edges without a shared endpoint
    NonManifoldTwoEdge {
        edges: [EdgeId; 2],
        first: HalfPlane,
        second: HalfPlane,
        /// Each edge has the other one on its interior side: the interior is between them
        facing: bool,
    },
    /// Three or more edges: membership is decided against the whole domain
    Crowded { edge_count: usize },
}

impl BlueCell {
    /// Classifies a cell from the ids of the closing edges touching it and the center of the cell
    pub fn classify(edges: &[EdgeId], edge_count: usize, center: Vertex, domain: &Domain) -> Self {
        if edge_count >= 3 || edges.len() >= 3 {
            return BlueCell::Crowded {
                edge_count: edge_count.max(edges.len()),
            };
        }
        match *edges {
            [edge] => {
                let e = domain.edge(edge);
                BlueCell::OneEdge {
                    edge,
                    side: HalfPlane::from_edge(e.from, e.to),
                }
            }
            [first_id, second_id] => {
                let (e1, e2) = (domain.edge(first_id), domain.edge(second_id));
                let same = |a: Vertex, b: Vertex| distance_squared(a, b) <= SNAP_DISTANCE_SQUARED;
                let corner = if same(e1.to, e2.from) {
                    Some((e1.from, e1.to, e2.to, [first_id, second_id]))
                } else if same(e2.to, e1.from) {
                    Some((e2.from, e2.to, e1.to, [second_id, first_id]))
                } else {
                    None
                };

                match corner {
                    Some((a, b, c, edges)) => {
                        let turn = area_triangle(a, b, c);
                        if turn.abs() <= AREA_EPSILON {
                            BlueCell::FlatCorner {
                                edges,
                                side: HalfPlane::from_edge(a, c),
                            }
                        } else {
                            BlueCell::ManifoldTwoEdge {
                                edges,
                                incoming: HalfPlane::from_edge(a, b),
                                outgoing: HalfPlane::from_edge(b, c),
                                convex: turn > 0.,
                            }
                        }
                    }
                    None if same(e1.from, e2.from) || same(e1.to, e2.to) => {
                        // Two loops touching at a vertex
                        BlueCell::Crowded { edge_count: 2 }
                    }
                    None => {
                        let first = HalfPlane::from_edge(e1.from, e1.to);
                        let second = HalfPlane::from_edge(e2.from, e2.to);
                        // Decided where the second edge passes by the cell
                        let facing =
                            first.contains(closest_point_on_segment(e2.from, e2.to, center));
                        BlueCell::NonManifoldTwoEdge {
                            edges: [first_id, second_id],
                            first,
                            second,
                            facing,
                        }
                    }
                }
            }
            _ => BlueCell::Crowded { edge_count: 0 },
        }
    }

    /// Returns `true` if `p`, a point of this cell, lies in the domain interior
    pub fn is_interior(&self, p: Vertex, domain: &Domain) -> bool {
        match self {
            BlueCell::OneEdge { side, .. } | BlueCell::FlatCorner { side, .. } => side.contains(p),
            BlueCell::ManifoldTwoEdge {
                incoming,
                outgoing,
                convex,
                ..
            } => {
                if *convex {
                    incoming.contains(p) && outgoing.contains(p)
                } else {
                    incoming.contains(p) || outgoing.contains(p)
                }
            }
            BlueCell::NonManifoldTwoEdge {
                first,
                second,
                facing,
                ..
            } => {
                if *facing {
                    first.contains(p) && second.contains(p)
                } else {
                    first.contains(p) || second.contains(p)
                }
            }
            BlueCell::Crowded { .. } => domain.contains(p),
        }
    }

    /// Interior part of the cell as a disjoint union of convex regions.
    ///
    /// Returns [None] when the configuration has no such decomposition ([BlueCell::Crowded]).
    pub fn interior_regions(&self) -> Option<ArrayVec<ConvexRegion, 2>> {
        let region = |planes: &[HalfPlane]| planes.iter().copied().collect::<ConvexRegion>();
        let mut regions = ArrayVec::new();
        match self {
            BlueCell::OneEdge { side, .. } | BlueCell::FlatCorner { side, .. } => {
                regions.push(region(&[*side]));
            }
            BlueCell::ManifoldTwoEdge {
                incoming: h1,
                outgoing: h2,
                convex,
                ..
            }
            | BlueCell::NonManifoldTwoEdge {
                first: h1,
                second: h2,
                facing: convex,
                ..
            } => {
                if *convex {
                    regions.push(region(&[*h1, *h2]));
                } else {
                    // H1 u H2 = H1 u (H2 n not H1)
                    regions.push(region(&[*h1]));
                    regions.push(region(&[*h2, h1.complement()]));
                }
            }
            BlueCell::Crowded { .. } => return None,
        }
        Some(regions)
    }

    pub fn edges(&self) -> ArrayVec<EdgeId, 2> {
        match self {
            BlueCell::OneEdge { edge, .. } => [*edge].into_iter().collect(),
            BlueCell::ManifoldTwoEdge { edges, .. }
            | BlueCell::FlatCorner { edges, .. }
            | BlueCell::NonManifoldTwoEdge { edges, .. } => ArrayVec::from(*edges),
            BlueCell::Crowded { .. } => ArrayVec::new(),
        }
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
        domain::Domain,
        membership::{BlueCell, HalfPlane},
        types::{EdgeId, Vertex},
    };

    fn l_shape() -> Domain {
        // 5---4
        // |   |
        // |   3-------2
        // |           |
        // 0-----------1
        Domain::from_flattened(&[0., 0., 4., 0., 4., 2., 2., 2., 2., 4., 0., 4.], &[], &[])
            .expect("Valid domain")
    }

    #[test]
    fn half_plane_sides() {
        let h = HalfPlane::from_edge(Vertex::new(0., 0.), Vertex::new(1., 0.));

        assert!(h.contains(Vertex::new(0.5, 1.)));
        assert!(!h.contains(Vertex::new(0.5, -1.)));
        assert!(h.complement().contains(Vertex::new(0.5, -1.)));
    }

    #[test]
    fn one_edge_cell() {
        let domain = l_shape();
        let cell = BlueCell::classify(&[0], 1, Vertex::new(1., 0.), &domain);

        assert!(matches!(cell, BlueCell::OneEdge { edge: 0, .. }));
        assert!(cell.is_interior(Vertex::new(1., 0.1), &domain));
        assert!(!cell.is_interior(Vertex::new(1., -0.1), &domain));
    }

    #[test]
    fn convex_and_reflex_corners() {
        let domain = l_shape();

        // Convex corner at vertex 1, edges 0 then 1
        let convex = BlueCell::classify(&[0, 1], 2, Vertex::new(4., 0.), &domain);
        assert!(matches!(
            convex,
            BlueCell::ManifoldTwoEdge { convex: true, .. }
        ));
        assert!(convex.is_interior(Vertex::new(3.9, 0.1), &domain));
        assert!(!convex.is_interior(Vertex::new(4.1, 0.1), &domain));
        assert!(!convex.is_interior(Vertex::new(3.9, -0.1), &domain));

        // Reflex corner at vertex 3, edges 2 then 3
        let reflex = BlueCell::classify(&[2, 3], 2, Vertex::new(2., 2.), &domain);
        assert!(matches!(
            reflex,
            BlueCell::ManifoldTwoEdge { convex: false, .. }
        ));
        assert!(reflex.is_interior(Vertex::new(1.9, 1.9), &domain));
        assert!(reflex.is_interior(Vertex::new(2.1, 1.9), &domain));
        assert!(reflex.is_interior(Vertex::new(1.9, 2.1), &domain));
        assert!(!reflex.is_interior(Vertex::new(2.1, 2.1), &domain));

        // Edge order in the cell does not matter: last then first edge of the loop
        let wrapping = BlueCell::classify(&[0, 5], 2, Vertex::new(0., 0.), &domain);
        assert!(matches!(
            wrapping,
            BlueCell::ManifoldTwoEdge {
                edges: [5, 0],
                convex: true,
                ..
            }
        ));
    }

    #[test]
    fn facing_edges() {
        // Thin corridor between the boundary and a hole
        let domain = Domain::from_flattened(
            &[0., 0., 10., 0., 10., 10., 0., 10.],
            &[vec![1., 0.5, 9., 0.5, 9., 9., 1., 9.]],
            &[],
        )
        .expect("Valid domain");
        let hole_bottom = (4..8)
            .find(|id: &EdgeId| domain.edge(*id).from.y == 0.5 && domain.edge(*id).to.y == 0.5)
            .expect("Hole has a bottom edge");

        let cell = BlueCell::classify(&[0, hole_bottom], 2, Vertex::new(5., 0.25), &domain);
        assert!(matches!(
            cell,
            BlueCell::NonManifoldTwoEdge { facing: true, .. }
        ));
        assert!(cell.is_interior(Vertex::new(5., 0.25), &domain));
        assert!(!cell.is_interior(Vertex::new(5., 0.75), &domain));
        assert!(!cell.is_interior(Vertex::new(5., -0.25), &domain));

        let regions = cell.interior_regions().expect("Convex decomposition");
        assert_eq!(1, regions.len());
        assert_eq!(2, regions[0].len());
    }

    #[test]
    fn facing_decided_near_the_cell() {
        // Long bottom side rising across the line of the hole bottom far from the cell
        let domain = Domain::from_flattened(
            &[45., 0.5, 245., 40.5, 245., 100., 45., 100.],
            &[vec![48., 2., 50., 2.5, 52., 2.]],
            &[],
        )
        .expect("Valid domain");
        let hole_bottom = (4..7)
            .find(|id: &EdgeId| domain.edge(*id).from.y == 2. && domain.edge(*id).to.y == 2.)
            .expect("Hole has a bottom edge");

        let cell = BlueCell::classify(&[hole_bottom, 0], 2, Vertex::new(50., 1.8), &domain);
        assert!(matches!(
            cell,
            BlueCell::NonManifoldTwoEdge { facing: true, .. }
        ));
        assert!(cell.is_interior(Vertex::new(50., 1.75), &domain));
        assert!(!cell.is_interior(Vertex::new(50., 2.1), &domain));
        assert!(!cell.is_interior(Vertex::new(50., 1.4), &domain));
    }

    #[test]
    fn crowded_cell_uses_domain() {
        let domain = l_shape();
        let cell = BlueCell::classify(&[1, 2, 3], 3, Vertex::new(3., 2.), &domain);

        assert_eq!(BlueCell::Crowded { edge_count: 3 }, cell);
        assert_eq!(None, cell.interior_regions());
        assert!(cell.is_interior(Vertex::new(3., 1.), &domain));
        assert!(!cell.is_interior(Vertex::new(3., 3.), &domain));
    }
}
