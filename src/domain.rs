use std::fmt;

use crate::{
    mesher::MeshingError,
    types::{EdgeId, Float, Vertex, Vertex2d},
    utils::{distance_squared, polygon_signed_area, AREA_EPSILON, SNAP_DISTANCE_SQUARED},
};

/// Identifies one of the input polylines
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PolylineRef {
    Boundary,
    Hole(usize),
    Crack(usize),
}
impl fmt::Display for PolylineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolylineRef::Boundary => write!(f, "outer boundary"),
            PolylineRef::Hole(i) => write!(f, "hole {}", i),
            PolylineRef::Crack(i) => write!(f, "crack {}", i),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Boundary,
    Hole,
    Crack,
}

/// One segment of an input polyline
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InputEdge {
    pub from: Vertex,
    pub to: Vertex,
    pub kind: EdgeKind,
}
impl InputEdge {
    /// Boundary and hole edges close the domain. The domain interior is on their left.
    #[inline]
    pub fn is_closing(&self) -> bool {
        self.kind != EdgeKind::Crack
    }

    #[inline]
    pub fn length_squared(&self) -> Float {
        distance_squared(self.from, self.to)
    }
}

/// The sampled region: an outer boundary, holes and cracks, stored as edge arrays.
///
/// Edges are stored boundary first, then holes, then cracks, so that an [EdgeId] lower than
/// [Domain::num_closing_edges] always designates a closing edge.
#[derive(Debug, Clone)]
pub struct Domain {
    edges: Vec<InputEdge>,
    num_boundary_edges: usize,
    num_closing_edges: usize,
    min: Vertex,
    max: Vertex,
}

impl Domain {
    /// Builds a domain from flattened `[x0, y0, x1, y1, ...]` polylines.
    ///
    /// Closed polylines (boundary and holes) do not need to repeat their first vertex.
    pub fn from_flattened(
        boundary: &[Float],
        holes: &[Vec<Float>],
        cracks: &[Vec<Float>],
    ) -> Result<Self, MeshingError> {
        let boundary = unflatten(boundary, PolylineRef::Boundary)?;
        let holes = holes
            .iter()
            .enumerate()
            .map(|(i, hole)| unflatten(hole, PolylineRef::Hole(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let cracks = cracks
            .iter()
            .enumerate()
            .map(|(i, crack)| unflatten(crack, PolylineRef::Crack(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(boundary, holes, cracks)
    }

    pub fn from_vertices<T: Vertex2d>(
        boundary: &[T],
        holes: &[Vec<T>],
        cracks: &[Vec<T>],
    ) -> Result<Self, MeshingError> {
        let convert = |polyline: &[T], polyline_ref: PolylineRef| {
            let vertices: Vec<Vertex> = polyline.iter().map(|v| v.to_vertex()).collect();
            if vertices.iter().any(|v| !v.is_finite()) {
                return Err(MeshingError::NonFiniteCoordinate {
                    polyline: polyline_ref,
                });
            }
            Ok(vertices)
        };
        let boundary = convert(boundary, PolylineRef::Boundary)?;
        let holes = holes
            .iter()
            .enumerate()
            .map(|(i, hole)| convert(hole, PolylineRef::Hole(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let cracks = cracks
            .iter()
            .enumerate()
            .map(|(i, crack)| convert(crack, PolylineRef::Crack(i)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(boundary, holes, cracks)
    }

    fn new(
        boundary: Vec<Vertex>,
        holes: Vec<Vec<Vertex>>,
        cracks: Vec<Vec<Vertex>>,
    ) -> Result<Self, MeshingError> {
        let mut edges = Vec::new();

        let mut boundary = clean_polyline(boundary, true);
        check_vertex_count(&boundary, PolylineRef::Boundary, 3)?;
        let area = polygon_signed_area(boundary.iter().copied());
        if area.abs() <= AREA_EPSILON {
            return Err(MeshingError::DegenerateLoop {
                polyline: PolylineRef::Boundary,
            });
        }
        // Interior on the left: counter-clockwise outer boundary
        if area < 0. {
            boundary.reverse();
        }
        push_loop_edges(&mut edges, &boundary, EdgeKind::Boundary);
        let num_boundary_edges = edges.len();

        for (i, hole) in holes.into_iter().enumerate() {
            let mut hole = clean_polyline(hole, true);
            check_vertex_count(&hole, PolylineRef::Hole(i), 3)?;
            let area = polygon_signed_area(hole.iter().copied());
            if area.abs() <= AREA_EPSILON {
                return Err(MeshingError::DegenerateLoop {
                    polyline: PolylineRef::Hole(i),
                });
            }
            // Interior on the left: clockwise holes
            if area > 0. {
                hole.reverse();
            }
            push_loop_edges(&mut edges, &hole, EdgeKind::Hole);
        }
        let num_closing_edges = edges.len();

        for (i, crack) in cracks.into_iter().enumerate() {
            let crack = clean_polyline(crack, false);
            check_vertex_count(&crack, PolylineRef::Crack(i), 2)?;
            for pair in crack.windows(2) {
                edges.push(InputEdge {
                    from: pair[0],
                    to: pair[1],
                    kind: EdgeKind::Crack,
                });
            }
        }

        let (mut min, mut max) = (Vertex::splat(Float::MAX), Vertex::splat(Float::MIN));
        for edge in edges.iter() {
            min = min.min(edge.from).min(edge.to);
            max = max.max(edge.from).max(edge.to);
        }

        Ok(Self {
            edges,
            num_boundary_edges,
            num_closing_edges,
            min,
            max,
        })
    }

    #[inline]
    pub fn edges(&self) -> &[InputEdge] {
        &self.edges
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> &InputEdge {
        &self.edges[id as usize]
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn num_boundary_edges(&self) -> usize {
        self.num_boundary_edges
    }

    /// Count of boundary and hole edges
    #[inline]
    pub fn num_closing_edges(&self) -> usize {
        self.num_closing_edges
    }

    #[inline]
    pub fn closing_edges(&self) -> &[InputEdge] {
        &self.edges[..self.num_closing_edges]
    }

    /// Bounding box of every input vertex, as `(min, max)`
    #[inline]
    pub fn bounds(&self) -> (Vertex, Vertex) {
        (self.min, self.max)
    }

    /// Crossing number test against the closing edges: `true` when `p` is inside the outer boundary
    /// and outside every hole.
    pub fn contains(&self, p: Vertex) -> bool {
        let mut inside = false;
        for edge in self.closing_edges() {
            let (a, b) = (edge.from, edge.to);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

fn unflatten(coordinates: &[Float], polyline: PolylineRef) -> Result<Vec<Vertex>, MeshingError> {
    if coordinates.len() % 2 != 0 {
        return Err(MeshingError::OddCoordinateCount {
            polyline,
            len: coordinates.len(),
        });
    }
    if coordinates.iter().any(|c| !c.is_finite()) {
        return Err(MeshingError::NonFiniteCoordinate { polyline });
    }
    Ok(coordinates
        .chunks_exact(2)
        .map(|xy| Vertex::new(xy[0], xy[1]))
        .collect())
}

/// Removes consecutive duplicates, and the repeated first vertex of a closed polyline
fn clean_polyline(mut vertices: Vec<Vertex>, closed: bool) -> Vec<Vertex> {
    vertices.dedup_by(|b, a| distance_squared(*a, *b) <= SNAP_DISTANCE_SQUARED);
    if closed && vertices.len() > 1 {
        let (first, last) = (vertices[0], vertices[vertices.len() - 1]);
        if distance_squared(first, last) <= SNAP_DISTANCE_SQUARED {
            vertices.pop();
        }
    }
    vertices
}

fn check_vertex_count(
    vertices: &[Vertex],
    polyline: PolylineRef,
    min: usize,
) -> Result<(), MeshingError> {
    if vertices.len() < min {
        return Err(MeshingError::TooFewVertices {
            polyline,
            count: vertices.len(),
            min,
        });
    }
    Ok(())
}

fn push_loop_edges(edges: &mut Vec<InputEdge>, vertices: &[Vertex], kind: EdgeKind) {
    for (i, from) in vertices.iter().enumerate() {
        edges.push(InputEdge {
            from: *from,
            to: vertices[(i + 1) % vertices.len()],
            kind,
        });
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
        domain::{Domain, EdgeKind, PolylineRef},
        mesher::MeshingError,
        types::{Float, Vertex},
    };

    #[test]
    fn clockwise_boundary_is_reoriented() {
        // 3-----2
        // |     |
        // 0-----1, given clockwise: 0 3 2 1
        let domain = Domain::from_flattened(&[0., 0., 0., 1., 1., 1., 1., 0.], &[], &[])
            .expect("Valid domain");

        assert_eq!(4, domain.num_closing_edges());
        assert_eq!(Vertex::new(1., 0.), domain.edge(0).from);
        assert_eq!(Vertex::new(1., 1.), domain.edge(0).to);
    }

    #[test]
    fn hole_is_clockwise_and_cracks_are_open() {
        let domain = Domain::from_flattened(
            &[0., 0., 4., 0., 4., 4., 0., 4.],
            &[vec![1., 1., 2., 1., 2., 2., 1., 2.]],
            &[vec![3., 0.5, 3., 1.5, 3., 3.5]],
        )
        .expect("Valid domain");

        assert_eq!(4, domain.num_boundary_edges());
        assert_eq!(8, domain.num_closing_edges());
        assert_eq!(10, domain.num_edges());
        assert_eq!(EdgeKind::Hole, domain.edge(4).kind);
        // Reversed hole: 1,2 -> 2,2 -> 2,1 -> 1,1
        assert_eq!(Vertex::new(1., 2.), domain.edge(4).from);
        assert_eq!(Vertex::new(2., 2.), domain.edge(4).to);
        assert_eq!(EdgeKind::Crack, domain.edge(9).kind);
        assert!(!domain.edge(9).is_closing());
    }

    #[test]
    fn repeated_closing_vertex_is_dropped() {
        let domain = Domain::from_flattened(&[0., 0., 1., 0., 1., 1., 0., 1., 0., 0.], &[], &[])
            .expect("Valid domain");

        assert_eq!(4, domain.num_edges());
    }

    #[test]
    fn point_in_domain() {
        let domain = Domain::from_flattened(
            &[0., 0., 4., 0., 4., 4., 0., 4.],
            &[vec![1., 1., 2., 1., 2., 2., 1., 2.]],
            &[],
        )
        .expect("Valid domain");

        assert!(domain.contains(Vertex::new(0.5, 0.5)));
        assert!(!domain.contains(Vertex::new(1.5, 1.5)));
        assert!(!domain.contains(Vertex::new(5., 1.5)));
        assert!(domain.contains(Vertex::new(3., 3.)));
    }

    #[test]
    fn invalid_inputs() {
        assert_eq!(
            MeshingError::OddCoordinateCount {
                polyline: PolylineRef::Boundary,
                len: 5
            },
            Domain::from_flattened(&[0., 0., 1., 0., 1.], &[], &[]).unwrap_err()
        );
        assert_eq!(
            MeshingError::TooFewVertices {
                polyline: PolylineRef::Crack(0),
                count: 1,
                min: 2
            },
            Domain::from_flattened(&[0., 0., 1., 0., 1., 1.], &[], &[vec![0.5, 0.5]])
                .unwrap_err()
        );
        assert_eq!(
            MeshingError::DegenerateLoop {
                polyline: PolylineRef::Boundary
            },
            Domain::from_flattened(&[0., 0., 1., 0., 2., 0.], &[], &[]).unwrap_err()
        );
        assert_eq!(
            MeshingError::NonFiniteCoordinate {
                polyline: PolylineRef::Hole(0)
            },
            Domain::from_flattened(
                &[0., 0., 1., 0., 1., 1.],
                &[vec![0.1, 0.1, Float::NAN, 0.2, 0.2, 0.3]],
                &[]
            )
            .unwrap_err()
        );
    }
}
