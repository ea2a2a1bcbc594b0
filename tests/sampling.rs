//! End to end properties of the point sets produced by the sampler.

mod support;

use ghx_poisson_cdt::{
    domain::PolylineRef, sample_domain, validate, MesherConfiguration, MeshingError,
};
use support::{
    checks::{disk_violation, samples_on_horizontal},
    domains::{cracked_square, seeded, square_with_hole, unit_square, L_SHAPE},
};

#[test]
fn unit_square_is_densely_sampled() {
    let dm = 0.1;
    for seed in [3, 8, 13] {
        let sampled = unit_square(dm, seed);

        assert!(sampled.len() >= 80, "Only {} samples", sampled.len());
        assert_eq!(None, disk_violation(&sampled, dm));
        assert!(sampled.stats.failed_cells.is_empty());
        assert_eq!(0, sampled.stats.uncovered_cells);
    }
}

#[test]
fn boundary_is_resampled() {
    let dm = 0.1;
    let sampled = unit_square(dm, 4);

    let bottom = samples_on_horizontal(&sampled, 0., 0., 1.);
    assert!(bottom.len() >= 6);
    assert_eq!(0., bottom[0].x);
    assert_eq!(1., bottom[bottom.len() - 1].x);
    for pair in bottom.windows(2) {
        let gap = pair[1].x - pair[0].x;
        assert!(gap >= dm * (1. - 1e-9), "Gap {} is too small", gap);
        assert!(gap <= 2. * dm * (1. + 1e-9), "Gap {} is too large", gap);
    }
}

#[test]
fn maximal_coverage() {
    for (dm, sampled) in [
        (0.1, unit_square(0.1, 5)),
        (0.08, square_with_hole(0.08, 6)),
        (0.05, cracked_square(0.05, 7)),
    ] {
        let report = validate(&sampled, 5000);
        assert!(report.uncovered_probes.is_empty(), "{:?}", report.uncovered_probes);
        assert!(report.min_distance >= dm);
        assert!(report.is_valid(), "{:?}", report);
    }
}

#[test]
fn reflex_corner() {
    let dm = 0.1;
    let sampled =
        sample_domain(dm, &L_SHAPE, &[], &[], &seeded(10)).expect("Sampling should succeed");

    for point in sampled.points.iter() {
        let p = point.position;
        assert!(!(p.x > 1. && p.y > 1.), "Sample {:?} is outside of the domain", p);
    }
    let report = validate(&sampled, 5000);
    assert!(report.is_valid(), "{:?}", report);
}

#[test]
fn same_seed_same_output() {
    let first = unit_square(0.1, 77);
    let second = unit_square(0.1, 77);
    assert_eq!(first.points, second.points);
    assert_eq!(first.stats, second.stats);

    let other = unit_square(0.1, 78);
    assert_ne!(first.positions(), other.positions());
}

#[test]
fn clock_seed_is_reported() {
    let config = MesherConfiguration {
        seed: None,
        build_triangulation: false,
        ..Default::default()
    };
    let boundary = [0., 0., 1., 0., 1., 1., 0., 1.];
    let first = sample_domain(0.1, &boundary, &[], &[], &config).expect("Sampling should succeed");

    let replay = sample_domain(
        0.1,
        &boundary,
        &[],
        &[],
        &MesherConfiguration {
            seed: Some(first.stats.seed),
            ..config
        },
    )
    .expect("Sampling should succeed");
    assert_eq!(first.positions(), replay.positions());
}

#[test]
fn invalid_inputs() {
    let config = seeded(0);
    assert_eq!(
        MeshingError::DegenerateLoop {
            polyline: PolylineRef::Boundary
        },
        sample_domain(0.1, &[0., 0., 1., 0., 2., 0.], &[], &[], &config)
            .err()
            .expect("Flat boundary")
    );
    assert_eq!(
        MeshingError::TooFewVertices {
            polyline: PolylineRef::Crack(0),
            count: 1,
            min: 2
        },
        sample_domain(
            0.1,
            &[0., 0., 1., 0., 1., 1.],
            &[],
            &[vec![0.5, 0.2]],
            &config
        )
        .err()
        .expect("Single vertex crack")
    );
    assert_eq!(
        MeshingError::NonFiniteCoordinate {
            polyline: PolylineRef::Hole(0)
        },
        sample_domain(
            0.1,
            &[0., 0., 1., 0., 1., 1.],
            &[vec![0.2, 0.2, f64::NAN, 0.3, 0.3, 0.4]],
            &[],
            &config
        )
        .err()
        .expect("NaN hole")
    );
}
