use ghx_poisson_cdt::{sample_domain, MesherConfiguration, SampledDomain};

pub const UNIT_SQUARE: [f64; 8] = [0., 0., 1., 0., 1., 1., 0., 1.];

/// L-shaped domain with a reflex corner at (1, 1)
pub const L_SHAPE: [f64; 12] = [0., 0., 2., 0., 2., 1., 1., 1., 1., 2., 0., 2.];

pub fn seeded(seed: u64) -> MesherConfiguration {
    MesherConfiguration {
        seed: Some(seed),
        ..Default::default()
    }
}

pub fn unit_square(dm: f64, seed: u64) -> SampledDomain {
    sample_domain(dm, &UNIT_SQUARE, &[], &[], &seeded(seed)).expect("Sampling should succeed")
}

/// Square `[0, 2]²` with a square hole `[0.7, 1.3]²`
pub fn square_with_hole(dm: f64, seed: u64) -> SampledDomain {
    let boundary = [0., 0., 2., 0., 2., 2., 0., 2.];
    let hole = vec![0.7, 0.7, 1.3, 0.7, 1.3, 1.3, 0.7, 1.3];
    sample_domain(dm, &boundary, &[hole], &[], &seeded(seed)).expect("Sampling should succeed")
}

/// Unit square with a horizontal crack from (0.2, 0.5) to (0.8, 0.5)
pub fn cracked_square(dm: f64, seed: u64) -> SampledDomain {
    let crack = vec![0.2, 0.5, 0.8, 0.5];
    sample_domain(dm, &UNIT_SQUARE, &[], &[crack], &seeded(seed))
        .expect("Sampling should succeed")
}

/// Unit square with a hole approximating the circle of center (0.5, 0.5) and radius `radius` by `sides` edges
pub fn circle_hole(dm: f64, radius: f64, sides: usize, seed: u64) -> SampledDomain {
    let hole: Vec<f64> = (0..sides)
        .flat_map(|k| {
            let angle = std::f64::consts::TAU * k as f64 / sides as f64;
            [0.5 + radius * angle.cos(), 0.5 + radius * angle.sin()]
        })
        .collect();
    sample_domain(dm, &UNIT_SQUARE, &[hole], &[], &seeded(seed))
        .expect("Sampling should succeed")
}
