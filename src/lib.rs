pub mod cdt;
pub mod domain;
pub mod grid;
pub mod membership;
pub mod mesher;
pub mod points;
pub mod rasterizer;
pub mod sampler;
pub mod sprinkler;
pub mod types;
pub mod utils;
pub mod validation;
pub mod void_polygon;
pub mod voids;

#[cfg(feature = "debug_context")]
pub mod debug;

pub use glam;
pub use hashbrown;

pub use domain::Domain;
pub use mesher::{
    sample, sample_domain, sample_domain_from_vertices, MeshPoint, MesherConfiguration,
    MeshingError, SampledDomain, SamplingStats,
};
pub use validation::{validate, ValidationReport};

///////////////////////////////////////////////////////////
///                                                     ///
///                        Tests                        ///
///                                                     ///
///////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {

    use crate::{
        mesher::{sample_domain, MesherConfiguration},
        types::{PointId, Vertex},
        utils::crossing_segments,
        validation::validate,
    };

    fn config(seed: u64) -> MesherConfiguration {
        MesherConfiguration {
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn square_with_hole() {
        // 3-------------2
        // |   7-----6   |
        // |   |     |   |
        // |   4-----5   |
        // 0-------------1
        let dm = 0.05;
        let boundary = [0., 0., 1., 0., 1., 1., 0., 1.];
        let hole = vec![0.3, 0.3, 0.7, 0.3, 0.7, 0.7, 0.3, 0.7];
        let sampled = sample_domain(dm, &boundary, &[hole], &[], &config(1))
            .expect("Sampling should succeed");

        for point in sampled.points.iter() {
            let p = point.position;
            let in_hole = p.x > 0.3 && p.x < 0.7 && p.y > 0.3 && p.y < 0.7;
            assert!(!in_hole, "Sample {:?} is inside the hole", p);
        }
        // Hole corners are sampled exactly
        for corner in [
            Vertex::new(0.3, 0.3),
            Vertex::new(0.7, 0.3),
            Vertex::new(0.7, 0.7),
            Vertex::new(0.3, 0.7),
        ] {
            assert!(sampled
                .points
                .iter()
                .any(|p| p.on_boundary && p.position == corner));
        }

        let report = validate(&sampled, 4000);
        assert!(report.is_valid(), "{:?}", report);
    }

    #[test]
    fn crack_samples_are_connected() {
        let dm = 0.05;
        let boundary = [0., 0., 1., 0., 1., 1., 0., 1.];
        let crack = vec![0.25, 0.4, 0.5, 0.6, 0.75, 0.4];
        let sampled = sample_domain(dm, &boundary, &[], &[crack], &config(2))
            .expect("Sampling should succeed");

        // Crack edges come after the 4 boundary edges
        let crack_edges: Vec<_> = sampled
            .edges()
            .into_iter()
            .filter(|(_, _, id)| matches!(id, Some(id) if *id >= 4))
            .collect();
        assert!(crack_edges.len() >= 2);

        let segments = [
            (Vertex::new(0.25, 0.4), Vertex::new(0.5, 0.6)),
            (Vertex::new(0.5, 0.6), Vertex::new(0.75, 0.4)),
        ];
        for (a, point) in sampled.points.iter().enumerate() {
            for edge in point.ring.iter() {
                let b = sampled.points[edge.to as usize].position;
                for (c, d) in segments {
                    assert!(
                        !crossing_segments(point.position, b, c, d),
                        "Edge {:?} crosses the crack",
                        (a as PointId, edge.to)
                    );
                }
            }
        }

        let report = validate(&sampled, 4000);
        assert!(report.is_valid(), "{:?}", report);
    }
}
