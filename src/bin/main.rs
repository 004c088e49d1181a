extern crate trajhub;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trajhub::cli::{self, RunOptions};
use trajhub::config::{BehaviourConfig, MacroConfig, ScenarioConfig, SourceConfig};
use trajhub::output::{ConsoleSink, PositionSink};
use trajhub::params::ParamBag;
use trajhub::{PositionStore, TrajectoryHub};

/// A lone source circling the origin next to a pair of sources tracing a figure 8 together
fn demo_scenario() -> ScenarioConfig {
    ScenarioConfig {
        sources: vec![SourceConfig { id: 0, position: [3.0, 0.0, 0.0], aperture: 0.0 }],
        macros: vec![MacroConfig {
            name: "pair".to_string(),
            anchor: [0.0, 0.0, 1.0],
            offsets: vec![[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]],
        }],
        behaviours: vec![
            BehaviourConfig {
                source: Some(0),
                macro_name: None,
                behaviour: "individual_rotation".to_string(),
                params: ParamBag::new().with("speed_z", 0.5),
            },
            BehaviourConfig {
                source: None,
                macro_name: Some("pair".to_string()),
                behaviour: "macro_trajectory".to_string(),
                params: ParamBag::new().with("shape", "figure8").with("speed", 0.1).with("radius", 2.0),
            },
        ],
        ..ScenarioConfig::default()
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(opts: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = match &opts.config {
        Some(path) => ScenarioConfig::load(path)?,
        None => demo_scenario(),
    };

    let mut store = PositionStore::new();
    let mut hub = TrajectoryHub::from_scenario(&scenario, &mut store)?;
    let mut sink = ConsoleSink::stdout(opts.format, opts.every);

    let dt = 1.0 / opts.tick_rate(hub.config().tick_rate);
    let ticks = (opts.duration / dt).round() as u64;
    info!("running {} ticks at {:.1} Hz with {} sources", ticks, 1.0 / dt, store.len());

    let mut failures = 0;
    for i in 0..ticks {
        let time = i as f64 * dt;
        let report = hub.update(&mut store, time, dt)?;
        failures += report.failures.len();
        sink.publish(&store.frame(report.tick, time + dt))?;
    }

    info!("done after {} ticks, {} component failures", hub.tick_count(), failures);
    Ok(())
}

fn main() {
    let opts = match cli::parse_command_line() {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        },
    };
    init_logging(opts.verbose);

    if let Err(err) = run(&opts) {
        error!("{}", err);
        std::process::exit(1);
    }
}
