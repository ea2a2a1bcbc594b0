use std::time::{SystemTime, UNIX_EPOCH};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::{
    cdt::build_local_triangulation,
    domain::{Domain, PolylineRef},
    grid::BackgroundGrid,
    points::PointCloud,
    rasterizer::rasterize,
    sampler::fill_randomly,
    sprinkler::sprinkle_boundaries,
    types::{CellId, EdgeId, Float, PointEdge, PointId, Vertex, Vertex2d},
    utils::area_triangle,
    voids::eliminate_voids,
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

#[cfg(feature = "debug_context")]
use crate::debug::{DebugConfiguration, DebugContext, Phase};

pub const DEFAULT_MODE_ONE_ITERATION_FACTOR: usize = 5;
pub const DEFAULT_MODE_ONE_MISS_LIMIT: usize = 300;
pub const DEFAULT_MODE_TWO_MISS_LIMIT: usize = 25;
pub const DEFAULT_MODE_TWO_AREA_FRACTION: Float = 0.7;
pub const DEFAULT_MODE_TWO_MIN_ITERATIONS: usize = 100;
pub const DEFAULT_MAX_VOID_PASSES: usize = 64;
pub const DEFAULT_MAX_SPLIT_POLYGONS: usize = 4;
pub const DEFAULT_CUT_ITERATION_LIMIT: usize = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MeshingError {
    #[error("Invalid minimal spacing {0}: must be finite and strictly positive")]
    InvalidSpacing(Float),
    #[error("The {polyline} has an odd count of coordinates ({len})")]
    OddCoordinateCount { polyline: PolylineRef, len: usize },
    #[error("The {polyline} contains a non-finite coordinate")]
    NonFiniteCoordinate { polyline: PolylineRef },
    #[error("The {polyline} has {count} vertices, at least {min} are required")]
    TooFewVertices {
        polyline: PolylineRef,
        count: usize,
        min: usize,
    },
    #[error("The {polyline} encloses no area")]
    DegenerateLoop { polyline: PolylineRef },
    #[error("The background grid would need {cells} cells")]
    GridTooLarge { cells: Float },
}

#[derive(Clone, Debug)]
pub struct MesherConfiguration {
    /// Seed of the random generator. A seed is drawn from the system clock when [None].
    pub seed: Option<u64>,
    /// Mode I draws at most this factor times the initial count of free cells
    pub mode_one_iteration_factor: usize,
    /// Mode I stops after this many consecutive rejected candidates
    pub mode_one_miss_limit: usize,
    /// A Mode II pass stops after this many consecutive draws without insertion
    pub mode_two_miss_limit: usize,
    /// A Mode II pass stops once the invalidated void regions cover this fraction of the pass total area
    pub mode_two_area_fraction: Float,
    /// Minimal count of draws of a Mode II pass
    pub mode_two_min_iterations: usize,
    /// Maximal count of Mode II passes
    pub max_void_passes: usize,
    /// Maximal count of void regions a single cell can be split into
    pub max_split_polygons: usize,
    /// Maximal count of disks clipped against a single cell void region
    pub cut_iteration_limit: usize,
    /// Build the neighbor rings once the sampling is done
    pub build_triangulation: bool,

    #[cfg(feature = "debug_context")]
    pub debug_config: DebugConfiguration,
}
impl Default for MesherConfiguration {
    fn default() -> Self {
        Self {
            seed: None,
            mode_one_iteration_factor: DEFAULT_MODE_ONE_ITERATION_FACTOR,
            mode_one_miss_limit: DEFAULT_MODE_ONE_MISS_LIMIT,
            mode_two_miss_limit: DEFAULT_MODE_TWO_MISS_LIMIT,
            mode_two_area_fraction: DEFAULT_MODE_TWO_AREA_FRACTION,
            mode_two_min_iterations: DEFAULT_MODE_TWO_MIN_ITERATIONS,
            max_void_passes: DEFAULT_MAX_VOID_PASSES,
            max_split_polygons: DEFAULT_MAX_SPLIT_POLYGONS,
            cut_iteration_limit: DEFAULT_CUT_ITERATION_LIMIT,
            build_triangulation: true,
            #[cfg(feature = "debug_context")]
            debug_config: DebugConfiguration::default(),
        }
    }
}

/// A sample of the output, with its neighbor ring
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPoint {
    pub position: Vertex,
    /// Sample of an input boundary, hole or crack
    pub on_boundary: bool,
    /// Neighbors, counter-clockwise. Empty when the triangulation was not built.
    pub ring: Vec<PointEdge>,
    /// The ring goes all the way around the point. Open rings start and end on a boundary neighbor.
    pub closed_ring: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingStats {
    /// Seed actually used, to replay the run
    pub seed: u64,
    pub grid_columns: usize,
    pub grid_rows: usize,
    pub boundary_points: usize,
    pub mode_one_points: usize,
    pub mode_two_points: usize,
    pub void_passes: usize,
    /// Cells whose void region could not be computed, and that may still hold a gap
    pub failed_cells: Vec<CellId>,
    /// Cells that still had a void region when Mode II stopped
    pub uncovered_cells: usize,
}

#[derive(Debug, Clone)]
pub struct SampledDomain {
    /// The validated input
    pub domain: Domain,
    /// Minimal spacing between two points
    pub dm: Float,
    /// Ordered by grid cell index, then by insertion order within a cell
    pub points: Vec<MeshPoint>,
    pub stats: SamplingStats,

    #[cfg(feature = "debug_context")]
    pub debug_context: DebugContext,
}

impl SampledDomain {
    /// Renumbers the points of `cloud` in cell order
    pub(crate) fn from_cloud(
        domain: Domain,
        dm: Float,
        grid: &BackgroundGrid,
        cloud: &PointCloud,
        stats: SamplingStats,
    ) -> Self {
        let mut new_ids = vec![0 as PointId; cloud.len()];
        let mut order = Vec::with_capacity(cloud.len());
        for cell in 0..grid.num_cells() {
            for id in cloud.cell_points(cell) {
                new_ids[id as usize] = order.len() as PointId;
                order.push(id);
            }
        }

        let points = order
            .iter()
            .map(|&id| {
                let point = cloud.point(id);
                MeshPoint {
                    position: point.position,
                    on_boundary: point.on_boundary,
                    ring: point
                        .edges
                        .iter()
                        .map(|e| PointEdge::new(new_ids[e.to as usize], e.edge_id))
                        .collect(),
                    closed_ring: point.closed_ring,
                }
            })
            .collect();

        Self {
            domain,
            dm,
            points,
            stats,
            #[cfg(feature = "debug_context")]
            debug_context: DebugContext::new(DebugConfiguration::default()),
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

    pub fn positions(&self) -> Vec<Vertex> {
        self.points.iter().map(|p| p.position).collect()
    }

    #[inline]
    pub fn connected(&self, a: PointId, b: PointId) -> bool {
        self.points[a as usize].ring.iter().any(|e| e.to == b)
    }

    /// Every undirected edge once, as `(a, b, edge_id)` with `a < b`
    pub fn edges(&self) -> Vec<(PointId, PointId, Option<EdgeId>)> {
        let mut edges = Vec::new();
        for (a, point) in self.points.iter().enumerate() {
            let a = a as PointId;
            for edge in point.ring.iter().filter(|e| a < e.to) {
                edges.push((a, edge.to, edge.edge_id));
            }
        }
        edges
    }

    /// Counter-clockwise triangles formed by each point and two consecutive connected neighbors of its ring.
    /// Each triangle is reported once, starting from its smallest vertex.
    pub fn triangles(&self) -> Vec<[PointId; 3]> {
        let mut triangles = Vec::new();
        for (a, point) in self.points.iter().enumerate() {
            let a = a as PointId;
            let n = point.ring.len();
            let pairs = match (point.closed_ring, n) {
                (_, 0) | (_, 1) => 0,
                (true, _) => n,
                (false, _) => n - 1,
            };
            for k in 0..pairs {
                let (b, c) = (point.ring[k].to, point.ring[(k + 1) % n].to);
                if a < b
                    && a < c
                    && self.connected(b, c)
                    && area_triangle(
                        point.position,
                        self.points[b as usize].position,
                        self.points[c as usize].position,
                    ) > 0.
                {
                    triangles.push([a, b, c]);
                }
            }
        }
        triangles
    }
}

/// Samples the domain described by flattened `[x0, y0, x1, y1, ...]` polylines: a closed outer boundary, closed
/// holes and open cracks.
///
/// No two output points are closer than `dm`, and every point of the domain lies within `dm` of an output point.
pub fn sample_domain(
    dm: Float,
    boundary: &[Float],
    holes: &[Vec<Float>],
    cracks: &[Vec<Float>],
    config: &MesherConfiguration,
) -> Result<SampledDomain, MeshingError> {
    check_spacing(dm)?;
    let domain = Domain::from_flattened(boundary, holes, cracks)?;
    sample(domain, dm, config)
}

/// Same as [sample_domain], with polylines given as vertices
pub fn sample_domain_from_vertices<T: Vertex2d>(
    dm: Float,
    boundary: &[T],
    holes: &[Vec<T>],
    cracks: &[Vec<T>],
    config: &MesherConfiguration,
) -> Result<SampledDomain, MeshingError> {
    check_spacing(dm)?;
    let domain = Domain::from_vertices(boundary, holes, cracks)?;
    sample(domain, dm, config)
}

/// Runs the whole pipeline on an already validated domain
pub fn sample(
    domain: Domain,
    dm: Float,
    config: &MesherConfiguration,
) -> Result<SampledDomain, MeshingError> {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "sample").entered();

    check_spacing(dm)?;
    let seed = config.seed.unwrap_or_else(seed_from_clock);
    debug!("Sampling with dm {} and seed {}", dm, seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    #[cfg(feature = "debug_context")]
    let mut debug_context = DebugContext::new(config.debug_config.clone());

    let grid = rasterize(&domain, dm)?;
    let mut cloud = PointCloud::new(&grid);

    let boundary_points = sprinkle_boundaries(&domain, &grid, &mut cloud, dm, &mut rng);
    #[cfg(feature = "debug_context")]
    {
        let ids: Vec<PointId> = (0..cloud.len() as PointId).collect();
        debug_context.push_snapshot(Phase::BoundarySprinkling, &cloud, &ids);
        debug_context.advance_step();
    }

    let mode_one_points = fill_randomly(
        &domain,
        &grid,
        &mut cloud,
        dm,
        config,
        &mut rng,
        #[cfg(feature = "debug_context")]
        &mut debug_context,
    );
    #[cfg(feature = "debug_context")]
    debug_context.push_snapshot(Phase::RandomFill, &cloud, &[]);

    let outcome = eliminate_voids(
        &domain,
        &grid,
        &mut cloud,
        dm,
        config,
        &mut rng,
        #[cfg(feature = "debug_context")]
        &mut debug_context,
    );
    #[cfg(feature = "debug_context")]
    debug_context.push_snapshot(Phase::VoidElimination, &cloud, &[]);

    if config.build_triangulation {
        build_local_triangulation(
            &domain,
            &grid,
            &mut cloud,
            dm,
            #[cfg(feature = "debug_context")]
            &mut debug_context,
        );
        #[cfg(feature = "debug_context")]
        debug_context.push_snapshot(Phase::LocalTriangulation, &cloud, &[]);
    }

    let stats = SamplingStats {
        seed,
        grid_columns: grid.columns,
        grid_rows: grid.rows,
        boundary_points,
        mode_one_points,
        mode_two_points: outcome.inserted,
        void_passes: outcome.passes,
        failed_cells: outcome.failed_cells,
        uncovered_cells: outcome.uncovered_cells,
    };
    debug!(
        "Sampled {} points: {} on boundaries, {} in Mode I, {} in Mode II ({} passes)",
        cloud.len(),
        stats.boundary_points,
        stats.mode_one_points,
        stats.mode_two_points,
        stats.void_passes
    );

    #[allow(unused_mut)]
    let mut sampled = SampledDomain::from_cloud(domain, dm, &grid, &cloud, stats);
    #[cfg(feature = "debug_context")]
    {
        sampled.debug_context = debug_context;
    }
    Ok(sampled)
}

fn check_spacing(dm: Float) -> Result<(), MeshingError> {
    if !dm.is_finite() || dm <= 0. {
        return Err(MeshingError::InvalidSpacing(dm));
    }
    Ok(())
}

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////
