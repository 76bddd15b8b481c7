use footfall::{BoundaryLine, Engine, EngineConfig, RawDetection};
use tracing_subscriber::EnvFilter;

fn main() -> footfall::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = EngineConfig::default();
    config.lines = vec![BoundaryLine::vertical(320.0, 480.0)];
    let mut engine = Engine::new(config)?;

    // A person walking left to right under an umbrella, crossing the
    // vertical counting line at x = 320.
    for seq in 0..30u64 {
        let x = 40.0 + seq as f64 * 20.0;
        let detections = [
            RawDetection {
                class_id: 0,
                score: 0.92,
                x_1: x - 25.0,
                y_1: 200.0,
                x_2: x + 25.0,
                y_2: 340.0,
            },
            RawDetection {
                class_id: 25,
                score: 0.81,
                x_1: x - 35.0,
                y_1: 185.0,
                x_2: x + 35.0,
                y_2: 225.0,
            },
        ];

        let report = engine.process_frame(seq, &detections);
        match serde_json::to_string(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("report serialization failed: {err}"),
        }
    }

    Ok(())
}
