use hashbrown::HashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::{
    mesher::SampledDomain,
    types::{EdgeId, Float, PointId, Vertex},
    utils::{crossing_segments, distance_squared},
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

/// Relative tolerance on the length of an input edge covered by the tagged edges of the output
const COVERAGE_TOLERANCE: Float = 1e-6;
/// Relative tolerance on the maximality radius
const MAXIMALITY_TOLERANCE: Float = 1e-9;

/// Result of the post-run checks of a [SampledDomain]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Smallest distance between two points, [Float::INFINITY] with less than 2 points
    pub min_distance: Float,
    /// Pairs of points closer than `dm`
    pub disk_violations: Vec<(PointId, PointId)>,
    /// Directed ring links without their reverse link, or with a different tag
    pub asymmetric_edges: Vec<(PointId, PointId)>,
    /// Input edges not fully covered by the tagged edges of the rings
    pub missing_boundary_edges: Vec<EdgeId>,
    /// Ring edges crossing an input edge
    pub crossing_edges: Vec<(PointId, PointId)>,
    /// Random positions of the domain farther than `dm` from every point
    pub uncovered_probes: Vec<Vertex>,
    /// Count of probes that landed in the domain
    pub probes: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.disk_violations.is_empty()
            && self.asymmetric_edges.is_empty()
            && self.missing_boundary_edges.is_empty()
            && self.crossing_edges.is_empty()
            && self.uncovered_probes.is_empty()
    }
}

/// Bucket grid of side `dm` over the output points
struct PointBuckets {
    dm: Float,
    buckets: HashMap<(i64, i64), Vec<PointId>>,
}
impl PointBuckets {
    fn new(sampled: &SampledDomain) -> Self {
        let mut buckets: HashMap<(i64, i64), Vec<PointId>> = HashMap::new();
        for (id, point) in sampled.points.iter().enumerate() {
            buckets
                .entry(bucket_of(point.position, sampled.dm))
                .or_default()
                .push(id as PointId);
        }
        Self {
            dm: sampled.dm,
            buckets,
        }
    }

    /// Points of the 3x3 buckets around `p`: every point closer than `dm` to `p` is among them
    fn around(&self, p: Vertex) -> impl Iterator<Item = PointId> + '_ {
        let (i, j) = bucket_of(p, self.dm);
        (-1..=1)
            .flat_map(move |di| (-1..=1).map(move |dj| (i + di, j + dj)))
            .filter_map(|key| self.buckets.get(&key))
            .flat_map(|ids| ids.iter().copied())
    }
}

fn bucket_of(p: Vertex, dm: Float) -> (i64, i64) {
    ((p.x / dm).floor() as i64, (p.y / dm).floor() as i64)
}

/// Checks the disk property, the ring symmetry, the constraint edges and the maximality of `sampled`.
///
/// Maximality is probed with `probe_count` uniform positions of the domain bounding box, drawn from a generator
/// seeded with the sampling seed.
pub fn validate(sampled: &SampledDomain, probe_count: usize) -> ValidationReport {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "validate").entered();

    let dm = sampled.dm;
    let dm2 = dm * dm;
    let buckets = PointBuckets::new(sampled);
    let mut report = ValidationReport {
        min_distance: Float::INFINITY,
        ..Default::default()
    };

    for (a, point) in sampled.points.iter().enumerate() {
        let a = a as PointId;
        for b in buckets.around(point.position).filter(|b| a < *b) {
            let d2 = distance_squared(point.position, sampled.points[b as usize].position);
            report.min_distance = report.min_distance.min(d2.sqrt());
            if d2 < dm2 {
                report.disk_violations.push((a, b));
            }
        }
    }
    // Closest pairs farther than dm are not seen by the buckets
    if report.min_distance == Float::INFINITY {
        report.min_distance = brute_force_min_distance(sampled);
    }

    for (a, point) in sampled.points.iter().enumerate() {
        let a = a as PointId;
        for edge in point.ring.iter() {
            let back = sampled.points[edge.to as usize]
                .ring
                .iter()
                .find(|e| e.to == a);
            if back.map(|e| e.edge_id) != Some(edge.edge_id) {
                report.asymmetric_edges.push((a, edge.to));
            }
        }
    }

    let mut covered = vec![0. as Float; sampled.domain.num_edges()];
    for (a, b, edge_id) in sampled.edges() {
        let (pa, pb) = (
            sampled.points[a as usize].position,
            sampled.points[b as usize].position,
        );
        if let Some(edge_id) = edge_id {
            covered[edge_id as usize] += distance_squared(pa, pb).sqrt();
        }
        if sampled
            .domain
            .edges()
            .iter()
            .any(|input| crossing_segments(pa, pb, input.from, input.to))
        {
            report.crossing_edges.push((a, b));
        }
    }
    for (edge_id, input) in sampled.domain.edges().iter().enumerate() {
        let length = input.length_squared().sqrt();
        if (covered[edge_id] - length).abs() > COVERAGE_TOLERANCE * length.max(dm) {
            report.missing_boundary_edges.push(edge_id as EdgeId);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(sampled.stats.seed);
    let (min, max) = sampled.domain.bounds();
    let radius2 = dm2 * (1. + MAXIMALITY_TOLERANCE);
    for _ in 0..probe_count {
        let z = min + Vertex::new(rng.gen::<Float>(), rng.gen::<Float>()) * (max - min);
        if !sampled.domain.contains(z) {
            continue;
        }
        report.probes += 1;
        if let Some(probe) = uncovered_probe(sampled, &buckets, z, radius2) {
            report.uncovered_probes.push(probe);
        }
    }

    if report.is_valid() {
        debug!(
            "Validated {} points, min distance {}, {} probes",
            sampled.len(),
            report.min_distance,
            report.probes
        );
    } else {
        warn!(
            "Validation failed: {} disk violations, {} asymmetric edges, {} missing boundary edges, {} crossing edges, {}/{} uncovered probes",
            report.disk_violations.len(),
            report.asymmetric_edges.len(),
            report.missing_boundary_edges.len(),
            report.crossing_edges.len(),
            report.uncovered_probes.len(),
            report.probes
        );
    }
    report
}

/// Returns `z` when no point lies within `sqrt(radius2)` of it
fn uncovered_probe(
    sampled: &SampledDomain,
    buckets: &PointBuckets,
    z: Vertex,
    radius2: Float,
) -> Option<Vertex> {
    let covered = buckets
        .around(z)
        .any(|id| distance_squared(sampled.points[id as usize].position, z) <= radius2);
    (!covered).then_some(z)
}

fn brute_force_min_distance(sampled: &SampledDomain) -> Float {
    let mut min_d2 = Float::INFINITY;
    for (a, pa) in sampled.points.iter().enumerate() {
        for pb in sampled.points[(a + 1)..].iter() {
            min_d2 = min_d2.min(distance_squared(pa.position, pb.position));
        }
    }
    min_d2.sqrt()
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
