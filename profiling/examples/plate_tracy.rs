use benchmarks::perforated_plate;
use ghx_poisson_cdt::{sample_domain, MesherConfiguration};
use tracing_subscriber::{layer::SubscriberExt, Registry};
use tracing_tracy::TracyLayer;

const PLATE_SIDE: f64 = 10.;
const HOLES_PER_SIDE: usize = 6;
const MIN_SPACING: f64 = 0.01;

fn main() {
    let subscriber = Registry::default().with(TracyLayer::default());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let input = perforated_plate(PLATE_SIDE, HOLES_PER_SIDE);
    let _sampled = sample_domain(
        MIN_SPACING,
        &input.boundary,
        &input.holes,
        &input.cracks,
        &MesherConfiguration {
            seed: Some(7),
            ..Default::default()
        },
    )
    .expect("Sampling should succeed");
}
