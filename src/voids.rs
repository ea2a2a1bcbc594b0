use hashbrown::HashSet;
use rand::Rng;
use tracing::{debug, warn};

use crate::{
    domain::Domain,
    grid::{BackgroundGrid, DISK_NEIGHBORHOOD},
    mesher::MesherConfiguration,
    points::PointCloud,
    sampler::accepts_candidate,
    types::{CellId, Float, Vertex},
    utils::distance_squared,
    void_polygon::{cell_regions, cut_polygon, CutFailure, VoidPolygon},
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

#[cfg(feature = "debug_context")]
use crate::debug::{DebugContext, EventInfo, Phase};

/// Draws per void region in one pass, before the minimal iteration count applies
const VOID_ITERATION_FACTOR: usize = 5;
/// Consecutive passes without any insertion after which the remaining voids are given up
const MAX_STALLED_PASSES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoidEliminationOutcome {
    /// Points inserted by all the passes
    pub inserted: usize,
    pub passes: usize,
    /// Free cells whose void region could not be built during the last pass
    pub failed_cells: Vec<CellId>,
    /// Free cells still holding a void region when the passes stopped
    pub uncovered_cells: usize,
}

/// Deterministic fill of the voids left by the random fill (Mode II).
///
/// Each pass computes the exact free region of every free cell, then samples them proportionally to their area.
/// Passes repeat until no void region remains, `max_void_passes` is reached, or [MAX_STALLED_PASSES] passes in a
/// row insert nothing.
pub fn eliminate_voids<R: Rng + ?Sized>(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &mut PointCloud,
    dm: Float,
    config: &MesherConfiguration,
    rng: &mut R,
    #[cfg(feature = "debug_context")] debug_context: &mut DebugContext,
) -> VoidEliminationOutcome {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "eliminate_voids").entered();

    let mut outcome = VoidEliminationOutcome::default();
    let mut stalled_passes = 0;
    let (mut polygons, mut failed_cells) = build_void_polygons(grid, cloud, dm, config);

    while !polygons.is_empty() {
        if outcome.passes >= config.max_void_passes {
            warn!(
                "Void elimination stopped after {} passes, {} void regions left",
                outcome.passes,
                polygons.len()
            );
            break;
        }
        outcome.passes += 1;

        #[cfg(feature = "debug_context")]
        {
            debug_context.push_snapshot_event(
                Phase::VoidElimination,
                EventInfo::VoidPass(outcome.passes),
                cloud,
                &[],
                &polygons,
            );
            if debug_context.advance_step() {
                break;
            }
        }

        let inserted = sample_voids(
            domain,
            grid,
            cloud,
            &polygons,
            dm,
            config,
            rng,
            #[cfg(feature = "debug_context")]
            debug_context,
        );
        debug!(
            "Void pass {}: {} regions, {} points inserted",
            outcome.passes,
            polygons.len(),
            inserted
        );
        outcome.inserted += inserted;

        (polygons, failed_cells) = build_void_polygons(grid, cloud, dm, config);

        if inserted == 0 {
            stalled_passes += 1;
            if stalled_passes >= MAX_STALLED_PASSES {
                warn!(
                    "Void elimination stalled, {} void regions left",
                    polygons.len()
                );
                break;
            }
        } else {
            stalled_passes = 0;
        }
    }

    for cell in failed_cells.iter() {
        warn!("Abandoned the void region of cell {}", cell);
    }
    outcome.failed_cells = failed_cells;
    outcome.uncovered_cells = polygons
        .iter()
        .map(|p| p.cell)
        .collect::<HashSet<CellId>>()
        .len();

    debug!(
        "Void elimination inserted {} points in {} passes, {} failed cells, {} uncovered cells",
        outcome.inserted,
        outcome.passes,
        outcome.failed_cells.len(),
        outcome.uncovered_cells
    );
    outcome
}

/// Void regions of every free cell, and the free cells whose region could not be built
pub fn build_void_polygons(
    grid: &BackgroundGrid,
    cloud: &PointCloud,
    dm: Float,
    config: &MesherConfiguration,
) -> (Vec<VoidPolygon>, Vec<CellId>) {
    #[cfg(feature = "more_profile_traces")]
    let _span = span!(Level::TRACE, "build_void_polygons").entered();

    let mut polygons = Vec::new();
    let mut failed_cells = Vec::new();
    for cell in 0..grid.num_cells() {
        if cloud.is_bad(cell) {
            continue;
        }
        match cell_void(grid, cloud, cell, dm, config) {
            Ok(regions) => {
                polygons.extend(
                    regions
                        .into_iter()
                        .filter(|r| !r.is_negligible(dm, grid.cell_size)),
                );
            }
            Err(failure) => {
                debug!("Void region of cell {}: {}", cell, failure);
                failed_cells.push(cell);
            }
        }
    }
    (polygons, failed_cells)
}

/// Part of the interior of `cell` not covered by any forbidding disk
pub fn cell_void(
    grid: &BackgroundGrid,
    cloud: &PointCloud,
    cell: CellId,
    dm: Float,
    config: &MesherConfiguration,
) -> Result<Vec<VoidPolygon>, CutFailure> {
    let mut regions: Vec<VoidPolygon> = cell_regions(grid, cell).into_iter().collect();
    let square_min = grid.cell_min(cell);
    let square_max = square_min + Vertex::splat(grid.cell_size);
    let dm2 = dm * dm;

    let mut cuts = 0;
    for id in cloud.neighborhood_points(grid, cell, &DISK_NEIGHBORHOOD) {
        let center = cloud.position(id);
        // Disks that do not reach the cell square are skipped
        if distance_squared(center.clamp(square_min, square_max), center) >= dm2 {
            continue;
        }
        cuts += 1;
        if cuts > config.cut_iteration_limit {
            return Err(CutFailure::TooManyCuts {
                max: config.cut_iteration_limit,
            });
        }

        let mut remaining = Vec::with_capacity(regions.len());
        for region in regions.iter() {
            remaining.extend(
                cut_polygon(region, id, center, dm, config.max_split_polygons)?
                    .into_iter()
                    .filter(|r| !r.is_negligible(dm, grid.cell_size)),
            );
        }
        if remaining.len() > config.max_split_polygons {
            return Err(CutFailure::TooManyPolygons {
                max: config.max_split_polygons,
            });
        }
        regions = remaining;
        if regions.is_empty() {
            break;
        }
    }
    Ok(regions)
}

/// One Mode II pass over `polygons`: regions are drawn proportionally to their area, and a random point of the drawn
/// region is inserted when it respects the disk property. A region is invalidated once its cell gets a point.
///
/// Returns the number of inserted points.
#[allow(clippy::too_many_arguments)]
fn sample_voids<R: Rng + ?Sized>(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &mut PointCloud,
    polygons: &[VoidPolygon],
    dm: Float,
    config: &MesherConfiguration,
    rng: &mut R,
    #[cfg(feature = "debug_context")] debug_context: &mut DebugContext,
) -> usize {
    let n = polygons.len();
    let areas: Vec<Float> = polygons.iter().map(|p| p.area(dm).max(0.)).collect();
    let cumulative: Vec<Float> = areas
        .iter()
        .scan(0., |sum, area| {
            *sum += area;
            Some(*sum)
        })
        .collect();
    let total_area = cumulative.last().copied().unwrap_or(0.);
    if total_area <= 0. {
        return 0;
    }

    let dm2 = dm * dm;
    let max_iterations = (VOID_ITERATION_FACTOR * n).max(config.mode_two_min_iterations);
    let mut invalid = vec![false; n];
    let mut invalidated_count = 0;
    let mut invalidated_area = 0.;
    let mut misses = 0;
    let mut inserted = 0;

    for _ in 0..max_iterations {
        if invalidated_count == n
            || invalidated_area > config.mode_two_area_fraction * total_area
            || misses > config.mode_two_miss_limit
        {
            break;
        }

        let u = rng.gen::<Float>() * total_area;
        let k = cumulative.partition_point(|c| *c <= u).min(n - 1);
        if invalid[k] {
            misses += 1;
            continue;
        }
        let polygon = &polygons[k];
        if !cloud.is_bad(polygon.cell) {
            let candidate = polygon.random_point(rng);
            if !accepts_candidate(domain, grid, cloud, polygon.cell, candidate, dm2) {
                misses += 1;
                continue;
            }
            let _id = cloud.insert(candidate, polygon.cell, false);
            inserted += 1;
            misses = 0;

            #[cfg(feature = "debug_context")]
            debug_context.push_snapshot_event(
                Phase::VoidElimination,
                EventInfo::Sampled(_id),
                cloud,
                &[_id],
                &[],
            );
        }

        // Either sampled or outdated: the cell now holds a point
        invalid[k] = true;
        invalidated_count += 1;
        invalidated_area += areas[k];
    }
    inserted
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use crate::{
        domain::Domain,
        grid::BackgroundGrid,
        mesher::MesherConfiguration,
        points::PointCloud,
        rasterizer::rasterize,
        sampler::fill_randomly,
        sprinkler::sprinkle_boundaries,
        types::{Float, PointId, Vertex},
        utils::distance_squared,
        voids::{build_void_polygons, eliminate_voids, VoidEliminationOutcome},
    };

    /// Runs every stage up to the void elimination on the unit square
    fn unit_square_voids(
        dm: Float,
        seed: u64,
    ) -> (BackgroundGrid, PointCloud, usize, VoidEliminationOutcome) {
        let config = MesherConfiguration::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let domain =
            Domain::from_flattened(&[0., 0., 1., 0., 1., 1., 0., 1.], &[], &[]).expect("Valid");
        let grid = rasterize(&domain, dm).expect("Grid should fit");
        let mut cloud = PointCloud::new(&grid);
        sprinkle_boundaries(&domain, &grid, &mut cloud, dm, &mut rng);
        fill_randomly(
            &domain,
            &grid,
            &mut cloud,
            dm,
            &config,
            &mut rng,
            #[cfg(feature = "debug_context")]
            &mut crate::debug::DebugContext::new(Default::default()),
        );
        let before = cloud.len();

        let outcome = eliminate_voids(
            &domain,
            &grid,
            &mut cloud,
            dm,
            &config,
            &mut rng,
            #[cfg(feature = "debug_context")]
            &mut crate::debug::DebugContext::new(Default::default()),
        );
        (grid, cloud, before, outcome)
    }

    #[test]
    fn voids_are_filled() {
        let dm = 0.1;
        let config = MesherConfiguration::default();
        let (grid, cloud, before, outcome) = unit_square_voids(dm, 21);

        assert_eq!(before + outcome.inserted, cloud.len());
        assert!(outcome.failed_cells.is_empty());
        assert_eq!(0, outcome.uncovered_cells);
        assert!(build_void_polygons(&grid, &cloud, dm, &config).0.is_empty());

        // Disk property still holds
        for a in 0..cloud.len() {
            for b in (a + 1)..cloud.len() {
                let d2 = distance_squared(cloud.position(a as PointId), cloud.position(b as PointId));
                assert!(d2 >= dm * dm - 1e-12);
            }
        }
        // Maximality: every interior position is covered by some disk
        let mut position_rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..2000 {
            let z = Vertex::new(position_rng.gen(), position_rng.gen());
            let covered = cloud
                .points
                .iter()
                .any(|p| distance_squared(p.position, z) <= dm * dm * (1. + 1e-6));
            assert!(covered, "Position {:?} is not covered", z);
        }
    }

    #[test]
    fn boundary_cells_are_not_abandoned() {
        // Grid columns fall on the square sides for this spacing
        for seed in 0..20 {
            let (_, _, _, outcome) = unit_square_voids(0.1, seed);
            assert!(
                outcome.failed_cells.is_empty(),
                "Seed {}: failed cells {:?}",
                seed,
                outcome.failed_cells
            );
            assert_eq!(0, outcome.uncovered_cells);
        }
    }
}
