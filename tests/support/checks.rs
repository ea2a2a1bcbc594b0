use ghx_poisson_cdt::{
    glam::DVec2,
    types::PointId,
    utils::{circumcircle, distance_squared},
    SampledDomain,
};

/// Brute force disk property check, returns the first pair closer than `dm`
pub fn disk_violation(sampled: &SampledDomain, dm: f64) -> Option<(usize, usize)> {
    for (a, pa) in sampled.points.iter().enumerate() {
        for (b, pb) in sampled.points.iter().enumerate().skip(a + 1) {
            if distance_squared(pa.position, pb.position) < dm * dm {
                return Some((a, b));
            }
        }
    }
    None
}

/// Returns the first directed ring link without its reverse, or with a different tag
pub fn asymmetric_edge(sampled: &SampledDomain) -> Option<(PointId, PointId)> {
    for (a, point) in sampled.points.iter().enumerate() {
        let a = a as PointId;
        for edge in point.ring.iter() {
            let back = sampled.points[edge.to as usize]
                .ring
                .iter()
                .find(|e| e.to == a);
            if back.map(|e| e.edge_id) != Some(edge.edge_id) {
                return Some((a, edge.to));
            }
        }
    }
    None
}

/// Returns a triangle whose circumcircle strictly contains another point
pub fn non_delaunay_triangle(sampled: &SampledDomain) -> Option<([PointId; 3], PointId)> {
    for triangle in sampled.triangles() {
        let [a, b, c] = triangle.map(|id| sampled.points[id as usize].position);
        let Some((center, r2)) = circumcircle(a, b, c) else {
            continue;
        };
        for (id, point) in sampled.points.iter().enumerate() {
            let id = id as PointId;
            if triangle.contains(&id) {
                continue;
            }
            if distance_squared(point.position, center) < r2 * (1. - 1e-9) {
                return Some((triangle, id));
            }
        }
    }
    None
}

/// Boundary samples lying on the line `y = y0` between `x0` and `x1`, sorted by `x`
pub fn samples_on_horizontal(sampled: &SampledDomain, y0: f64, x0: f64, x1: f64) -> Vec<DVec2> {
    let mut samples: Vec<DVec2> = sampled
        .points
        .iter()
        .filter(|p| p.on_boundary && p.position.y == y0 && p.position.x >= x0 && p.position.x <= x1)
        .map(|p| p.position)
        .collect();
    samples.sort_by(|a, b| a.x.total_cmp(&b.x));
    samples
}

pub fn triangle_centroid(sampled: &SampledDomain, triangle: [PointId; 3]) -> DVec2 {
    triangle
        .iter()
        .fold(DVec2::ZERO, |sum, id| sum + sampled.points[*id as usize].position)
        / 3.
}
