use arrayvec::ArrayVec;

use crate::types::{Float, Vertex};

#[cfg(feature = "more_profile_traces")]
use tracing::{span, Level};

/// Below this absolute signed area, three points are considered collinear
pub const AREA_EPSILON: Float = 1e-10;
/// Two positions closer than this (squared) are the same location
pub const SNAP_DISTANCE_SQUARED: Float = 1e-20;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EdgesIntersectionResult {
    None,
    /// The interiors of the two segments cross at a single point
    Crossing,
    /// An endpoint of one segment lies on the other one
    OnEdgeTip,
    /// The segments share an endpoint
    SharedEndpoint,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Orientation {
    Colinear,
    Clockwise,
    CounterClockwise,
}

/// Signed area of the triangle `(a, b, c)`. Positive when the triangle is counter-clockwise,
/// in other words when `c` lies on the left of the oriented line `a -> b`.
#[inline(always)]
pub fn area_triangle(a: Vertex, b: Vertex, c: Vertex) -> Float {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y))
}

#[inline(always)]
pub fn distance_squared(a: Vertex, b: Vertex) -> Float {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    dx * dx + dy * dy
}

/// Returns the orientation of an ordered triplet (p, q, r), with [AREA_EPSILON] tolerance.
#[inline]
pub fn triplet_orientation(p: Vertex, q: Vertex, r: Vertex) -> Orientation {
    let area = area_triangle(p, q, r);
    if area.abs() <= AREA_EPSILON {
        Orientation::Colinear
    } else if area > 0. {
        Orientation::CounterClockwise
    } else {
        Orientation::Clockwise
    }
}

/// Given three collinear points p, q, r, the function checks if point `q` lies on line segment 'pr'
#[inline]
pub fn on_segment(p: Vertex, q: Vertex, r: Vertex) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// Classifies the intersection of the segments `edge_1` and `edge_2`.
///
/// Orientation tests use [AREA_EPSILON], so nearly touching segments are reported as [EdgesIntersectionResult::OnEdgeTip]
/// rather than [EdgesIntersectionResult::Crossing].
pub fn edges_intersect(
    edge_1: (Vertex, Vertex),
    edge_2: (Vertex, Vertex),
) -> EdgesIntersectionResult {
    let same = |a: Vertex, b: Vertex| distance_squared(a, b) <= SNAP_DISTANCE_SQUARED;
    if same(edge_1.0, edge_2.0)
        || same(edge_1.0, edge_2.1)
        || same(edge_1.1, edge_2.0)
        || same(edge_1.1, edge_2.1)
    {
        return EdgesIntersectionResult::SharedEndpoint;
    }

    let orientation_1 = triplet_orientation(edge_1.0, edge_1.1, edge_2.0);
    let orientation_2 = triplet_orientation(edge_1.0, edge_1.1, edge_2.1);
    let orientation_3 = triplet_orientation(edge_2.0, edge_2.1, edge_1.0);
    let orientation_4 = triplet_orientation(edge_2.0, edge_2.1, edge_1.1);

    let strictly_opposed = |o1: Orientation, o2: Orientation| {
        o1 != o2 && o1 != Orientation::Colinear && o2 != Orientation::Colinear
    };
    if strictly_opposed(orientation_1, orientation_2)
        && strictly_opposed(orientation_3, orientation_4)
    {
        return EdgesIntersectionResult::Crossing;
    }

    if (orientation_1 == Orientation::Colinear && on_segment(edge_1.0, edge_2.0, edge_1.1))
        || (orientation_2 == Orientation::Colinear && on_segment(edge_1.0, edge_2.1, edge_1.1))
        || (orientation_3 == Orientation::Colinear && on_segment(edge_2.0, edge_1.0, edge_2.1))
        || (orientation_4 == Orientation::Colinear && on_segment(edge_2.0, edge_1.1, edge_2.1))
    {
        return EdgesIntersectionResult::OnEdgeTip;
    }

    EdgesIntersectionResult::None
}

/// Returns `true` only when the interiors of the segments `(a, b)` and `(c, d)` properly cross
#[inline]
pub fn crossing_segments(a: Vertex, b: Vertex, c: Vertex, d: Vertex) -> bool {
    edges_intersect((a, b), (c, d)) == EdgesIntersectionResult::Crossing
}

/// Point of the segment `(a, b)` closest to `p`
#[inline]
pub fn closest_point_on_segment(a: Vertex, b: Vertex, p: Vertex) -> Vertex {
    let d = b - a;
    let length_squared = d.dot(d);
    if length_squared <= SNAP_DISTANCE_SQUARED {
        return a;
    }
    a + d * ((p - a).dot(d) / length_squared).clamp(0., 1.)
}

/// Returns `true` if `p` lies in the triangle `(a, b, c)` or on its border, whatever the triangle orientation.
///
/// Border tolerance is [AREA_EPSILON].
#[inline]
pub fn point_in_triangle(a: Vertex, b: Vertex, c: Vertex, p: Vertex) -> bool {
    let areas = [
        area_triangle(a, b, p),
        area_triangle(b, c, p),
        area_triangle(c, a, p),
    ];
    areas.iter().all(|area| *area >= -AREA_EPSILON)
        || areas.iter().all(|area| *area <= AREA_EPSILON)
}

/// Returns `true` if `p` lies in the convex polygon `ring`, border included.
///
/// `ring` is walked as a fan of triangles around its first vertex.
pub fn point_in_convex_hull(ring: &[Vertex], p: Vertex) -> bool {
    let Some((&first, rest)) = ring.split_first() else {
        return false;
    };
    rest.windows(2)
        .any(|pair| point_in_triangle(first, pair[0], pair[1], p))
}

/// Center and squared radius of the circle through `a`, `b` and `c`.
///
/// Returns [None] for (nearly) collinear points.
pub fn circumcircle(a: Vertex, b: Vertex, c: Vertex) -> Option<(Vertex, Float)> {
    #[cfg(feature = "more_profile_traces")]
    let _span = span!(Level::TRACE, "circumcircle").entered();

    let (bx, by) = (b.x - a.x, b.y - a.y);
    let (cx, cy) = (c.x - a.x, c.y - a.y);
    let d = 2. * (bx * cy - by * cx);
    // d is four times the signed area of the triangle
    if d.abs() <= 4. * AREA_EPSILON {
        return None;
    }
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    if !ux.is_finite() || !uy.is_finite() {
        return None;
    }
    Some((Vertex::new(a.x + ux, a.y + uy), ux * ux + uy * uy))
}

/// Signed area of a closed ring of vertices, positive for a counter-clockwise ring
pub fn polygon_signed_area<I: IntoIterator<Item = Vertex>>(ring: I) -> Float {
    let mut iter = ring.into_iter();
    let Some(first) = iter.next() else {
        return 0.;
    };
    let mut twice_area = 0.;
    let mut prev = first;
    for v in iter {
        twice_area += prev.x * v.y - v.x * prev.y;
        prev = v;
    }
    twice_area += prev.x * first.y - first.x * prev.y;
    0.5 * twice_area
}

/// Parameters `t` in `]0, 1[` where the segment `a + t (b - a)` meets the circle of center `c` and squared radius `r2`,
/// in increasing order. Tangent contacts are ignored.
pub fn segment_circle_intersections(
    a: Vertex,
    b: Vertex,
    c: Vertex,
    r2: Float,
) -> ArrayVec<Float, 2> {
    let mut params = ArrayVec::new();
    let d = b - a;
    let f = a - c;
    let qa = d.dot(d);
    if qa <= SNAP_DISTANCE_SQUARED {
        return params;
    }
    let qb = 2. * f.dot(d);
    let qc = f.dot(f) - r2;
    let discriminant = qb * qb - 4. * qa * qc;
    if discriminant <= 0. {
        return params;
    }
    let root = discriminant.sqrt();
    let tolerance = 1e-12;
    for t in [(-qb - root) / (2. * qa), (-qb + root) / (2. * qa)] {
        if t > tolerance && t < 1. - tolerance {
            params.push(t);
        }
    }
    params
}

/// Intersection points of two circles with the same squared radius `r2` and centers `c1`, `c2`.
///
/// The first returned point is on the left of `c1 -> c2`, the second on its right.
/// Returns [None] when the circles do not properly intersect.
pub fn circles_intersection(c1: Vertex, c2: Vertex, r2: Float) -> Option<(Vertex, Vertex)> {
    let d2 = distance_squared(c1, c2);
    if d2 <= SNAP_DISTANCE_SQUARED {
        return None;
    }
    let h2 = (r2 - 0.25 * d2) / d2;
    if h2 <= 0. {
        return None;
    }
    let h = h2.sqrt();
    let mid = 0.5 * (c1 + c2);
    let (dx, dy) = (c2.x - c1.x, c2.y - c1.y);
    Some((
        Vertex::new(mid.x - h * dy, mid.y + h * dx),
        Vertex::new(mid.x + h * dy, mid.y - h * dx),
    ))
}

/// Angle in `[0, 2PI[` swept when turning clockwise around `center` from `from` to `to`
#[inline]
pub fn clockwise_angle(center: Vertex, from: Vertex, to: Vertex) -> Float {
    let a_from = (from.y - center.y).atan2(from.x - center.x);
    let a_to = (to.y - center.y).atan2(to.x - center.x);
    (a_from - a_to).rem_euclid(std::f64::consts::TAU)
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
