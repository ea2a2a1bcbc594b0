use rand::Rng;
use tracing::debug;

use crate::{
    domain::Domain,
    grid::BackgroundGrid,
    points::PointCloud,
    types::{EdgeId, Float, PointId, Vertex},
    utils::{distance_squared, SNAP_DISTANCE_SQUARED},
};

#[cfg(feature = "profile_traces")]
use tracing::{span, Level};

/// Places samples exactly on every input edge (boundary, holes and cracks), connected by constrained edges.
///
/// Each edge is split at random positions until every piece is at most `2 dm` long; each split point lies
/// at least `dm` away from both ends of the piece it splits. Samples falling on an existing point
/// (shared corners, crack tips on a boundary) reuse it.
///
/// Returns the number of points created.
pub fn sprinkle_boundaries<R: Rng + ?Sized>(
    domain: &Domain,
    grid: &BackgroundGrid,
    cloud: &mut PointCloud,
    dm: Float,
    rng: &mut R,
) -> usize {
    #[cfg(feature = "profile_traces")]
    let _span = span!(Level::TRACE, "sprinkle_boundaries").entered();

    let initial_count = cloud.len();
    let max_length_squared = 4. * dm * dm;

    for (edge_index, edge) in domain.edges().iter().enumerate() {
        let edge_id = edge_index as EdgeId;
        let samples = split_segment(edge.from, edge.to, dm, max_length_squared, rng);

        let mut previous: Option<PointId> = None;
        for position in samples {
            let point = match cloud.closest_point(grid, position, SNAP_DISTANCE_SQUARED) {
                Some(existing) => existing,
                None => {
                    let Some(cell) = grid.cell_of(position) else {
                        continue;
                    };
                    cloud.insert(position, cell, true)
                }
            };
            if let Some(previous) = previous {
                cloud.add_constraint_edge(previous, point, Some(edge_id));
            }
            previous = Some(point);
        }
    }

    let created = cloud.len() - initial_count;
    debug!(
        "Sprinkled {} points along {} input edges",
        created,
        domain.num_edges()
    );
    created
}

/// Ordered samples of the segment `(from, to)`, both ends included, with consecutive samples at most
/// `sqrt(max_length_squared)` apart.
fn split_segment<R: Rng + ?Sized>(
    from: Vertex,
    to: Vertex,
    dm: Float,
    max_length_squared: Float,
    rng: &mut R,
) -> Vec<Vertex> {
    let mut samples = vec![from, to];
    let mut i = 0;
    while i + 1 < samples.len() {
        let (a, b) = (samples[i], samples[i + 1]);
        let length_squared = distance_squared(a, b);
        if length_squared > max_length_squared {
            let length = length_squared.sqrt();
            let offset = dm + rng.gen::<Float>() * (length - 2. * dm);
            samples.insert(i + 1, a + (b - a) * (offset / length));
        } else {
            i += 1;
        }
    }
    samples
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
        points::PointCloud,
        rasterizer::rasterize,
        sprinkler::{split_segment, sprinkle_boundaries},
        types::{PointId, Vertex},
        utils::distance_squared,
    };

    #[test]
    fn split_pieces_are_between_dm_and_two_dm() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let dm = 0.1;
        let (from, to) = (Vertex::new(0., 0.), Vertex::new(1., 0.5));

        let samples = split_segment(from, to, dm, 4. * dm * dm, &mut rng);

        assert_eq!(from, samples[0]);
        assert_eq!(to, *samples.last().expect("Not empty"));
        for pair in samples.windows(2) {
            let d2 = distance_squared(pair[0], pair[1]);
            assert!(d2 <= 4. * dm * dm + 1e-12);
            assert!(d2 >= dm * dm - 1e-12);
            // Samples stay ordered along the segment
            assert!(pair[1].x > pair[0].x);
        }
    }

    #[test]
    fn short_edge_is_not_split() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let samples = split_segment(Vertex::new(0., 0.), Vertex::new(0.05, 0.), 0.1, 0.04, &mut rng);

        assert_eq!(2, samples.len());
    }

    #[test]
    fn corners_are_shared_and_loops_closed() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let domain =
            Domain::from_flattened(&[0., 0., 1., 0., 1., 1., 0., 1.], &[], &[]).expect("Valid");
        let grid = rasterize(&domain, 0.1).expect("Grid should fit");
        let mut cloud = PointCloud::new(&grid);

        let created = sprinkle_boundaries(&domain, &grid, &mut cloud, 0.1, &mut rng);

        assert_eq!(created, cloud.len());
        for id in 0..cloud.len() {
            let point = cloud.point(id as PointId);
            assert!(point.on_boundary);
            // A closed loop: every sample has exactly two constrained neighbors
            assert_eq!(2, point.edges.len());
            assert!(point.edges.iter().all(|e| e.edge_id.is_some()));
        }
        let corners = [
            Vertex::new(0., 0.),
            Vertex::new(1., 0.),
            Vertex::new(1., 1.),
            Vertex::new(0., 1.),
        ];
        for corner in corners {
            assert!(cloud.closest_point(&grid, corner, 1e-20).is_some());
        }
    }
}
