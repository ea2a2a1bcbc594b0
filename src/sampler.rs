use rand::Rng;
use tracing::debug;

use crate::{
    domain::Domain,
    grid::BackgroundGrid,
    mesher::MesherConfiguration,
    points::PointCloud,
    types::{CellId, Float, Vertex},
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

#[cfg(feature = "progress_log")]
use tracing::info;

#[cfg(feature = "debug_context")]
use crate::debug::{DebugContext, EventInfo, Phase};

/// Random fill of the domain (Mode I).
///
/// Draws uniformly random cells and random positions in them, and keeps a candidate when its cell is still free,
/// when it lies in the domain interior and when no existing point is closer than `dm`.
/// Stops after `mode_one_iteration_factor` times the initial count of free cells, or after `mode_one_miss_limit`
/// consecutive rejections.
///
/// Returns the number of inserted points.
pub fn fill_randomly<R: Rng + ?Sized>(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &mut PointCloud,
    dm: Float,
    config: &MesherConfiguration,
    rng: &mut R,
    #[cfg(feature = "debug_context")] debug_context: &mut DebugContext,
) -> usize {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "fill_randomly").entered();

    let num_cells = grid.num_cells();
    let free_cells = num_cells - cloud.num_bad();
    let max_iterations = config.mode_one_iteration_factor * free_cells;
    let dm2 = dm * dm;

    let mut inserted = 0;
    let mut misses = 0;
    for _iteration in 0..max_iterations {
        if misses > config.mode_one_miss_limit {
            break;
        }

        #[cfg(feature = "progress_log")]
        {
            if _iteration % ((max_iterations / 20) + 1) == 0 {
                let progress = 100. * _iteration as f32 / max_iterations as f32;
                info!(
                    "Mode I progress, {}%: {} points inserted, {}/{} cells filled",
                    progress,
                    inserted,
                    cloud.num_bad(),
                    num_cells
                );
            }
        }

        let cell = rng.gen_range(0..num_cells);
        if cloud.is_bad(cell) {
            continue;
        }

        let candidate = grid.cell_min(cell)
            + Vertex::new(rng.gen::<Float>(), rng.gen::<Float>()) * grid.cell_size;
        if !accepts_candidate(domain, grid, cloud, cell, candidate, dm2) {
            misses += 1;
            continue;
        }

        misses = 0;
        let _id = cloud.insert(candidate, cell, false);
        inserted += 1;

        #[cfg(feature = "debug_context")]
        {
            debug_context.push_snapshot_event(
                Phase::RandomFill,
                EventInfo::Sampled(_id),
                cloud,
                &[_id],
                &[],
            );
            if debug_context.advance_step() {
                break;
            }
        }
    }

    debug!(
        "Mode I inserted {} points, {} cells left free",
        inserted,
        num_cells - cloud.num_bad()
    );
    inserted
}

/// A free-cell candidate is valid if it lies in the domain interior and respects the disk property
pub(crate) fn accepts_candidate(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &PointCloud,
    cell: CellId,
    candidate: Vertex,
    dm2: Float,
) -> bool {
    if let Some(blue_cell) = grid.blue_cell(cell) {
        if !blue_cell.is_interior(candidate, domain) {
            return false;
        }
    }
    cloud.respects_disk(grid, cell, candidate, dm2)
}

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        domain::Domain,
        mesher::MesherConfiguration,
        points::PointCloud,
        rasterizer::rasterize,
        sampler::fill_randomly,
        sprinkler::sprinkle_boundaries,
        types::PointId,
        utils::distance_squared,
    };

    #[test]
    fn random_fill_respects_disks_and_domain() {
        let dm = 0.1;
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let domain = Domain::from_flattened(
            &[0., 0., 1., 0., 1., 1., 0., 1.],
            &[vec![0.3, 0.3, 0.7, 0.3, 0.7, 0.7, 0.3, 0.7]],
            &[],
        )
        .expect("Valid domain");
        let grid = rasterize(&domain, dm).expect("Grid should fit");
        let mut cloud = PointCloud::new(&grid);
        sprinkle_boundaries(&domain, &grid, &mut cloud, dm, &mut rng);
        let boundary_count = cloud.len();

        let inserted = fill_randomly(
            &domain,
            &grid,
            &mut cloud,
            dm,
            &MesherConfiguration::default(),
            &mut rng,
            #[cfg(feature = "debug_context")]
            &mut crate::debug::DebugContext::new(Default::default()),
        );

        assert!(inserted > 0);
        assert_eq!(boundary_count + inserted, cloud.len());
        for id in boundary_count..cloud.len() {
            let p = cloud.position(id as PointId);
            assert!(domain.contains(p), "Sample {:?} is outside of the domain", p);
            for other in 0..cloud.len() {
                if other != id {
                    assert!(distance_squared(p, cloud.position(other as PointId)) >= dm * dm);
                }
            }
        }
    }
}
