use benchmarks::perforated_plate;
use ghx_poisson_cdt::{sample_domain, validate, MesherConfiguration};
use tracing::Level;

const MIN_SPACING: f64 = 0.02;
const PROBE_COUNT: usize = 10_000;

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let input = perforated_plate(1., 3);
    let sampled = sample_domain(
        MIN_SPACING,
        &input.boundary,
        &input.holes,
        &input.cracks,
        &MesherConfiguration::default(),
    )
    .expect("Sampling should succeed");

    println!(
        "{} points, {} triangles, stats: {:?}",
        sampled.len(),
        sampled.triangles().len(),
        sampled.stats
    );
    let report = validate(&sampled, PROBE_COUNT);
    println!(
        "Valid: {}, min distance {}, {}/{} uncovered probes",
        report.is_valid(),
        report.min_distance,
        report.uncovered_probes.len(),
        report.probes
    );
}
