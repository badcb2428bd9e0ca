use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use traffic_monitor::{
    alerts::{Alert, AlertListener, AlertManager},
    config::TrafficConfig,
    feed::{FeedBackend, VehicleFeed},
    simulation::SimulationCore,
};

#[derive(Parser)]
#[command(name = "traffic-monitor")]
#[command(about = "Headless road traffic simulation with congestion alerts")]
struct Args {
    /// Configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "traffic.toml")]
    config: PathBuf,

    /// Road segment source (id,x1,y1,x2,y2)
    #[arg(short, long, default_value = "data/roads.csv")]
    roads: PathBuf,

    /// Vehicle source (id,segmentId,position,velX,velY)
    #[arg(long, default_value = "data/vehicles.csv")]
    vehicles: PathBuf,

    /// Simulated seconds to run
    #[arg(short, long, default_value_t = 10.0)]
    duration: f64,

    /// Random seed for reproducible simulations
    #[arg(short, long)]
    seed: Option<u64>,

    /// Enable verbose logging for detailed simulation progress
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();
    info!("Starting traffic monitor (console mode)");

    // Load configuration
    let mut config = if args.config.exists() {
        TrafficConfig::load_from_file(&args.config)?
    } else {
        info!("No configuration at {}, using defaults", args.config.display());
        TrafficConfig::default()
    };
    if args.seed.is_some() {
        config.simulation.seed = args.seed;
    }

    let core = Arc::new(SimulationCore::from_config(None, &config));
    core.initialize(&args.roads, &args.vehicles)?;

    let alerts = Arc::new(AlertManager::with_params(Arc::clone(&core), &config.alerts));
    let listener: AlertListener = Arc::new(|alert: &Alert| {
        info!("New {} alert on segment {}", alert.alert_type, alert.segment_id);
    });
    alerts.set_listener(Some(listener));

    let mut feed = FeedBackend::from_params(&config.feed, config.simulation.seed);
    if let Some(feed) = &feed {
        info!("Live feed: {}", feed.get_name());
    }

    // Reader thread standing in for a renderer polling snapshots
    let running = Arc::new(AtomicBool::new(true));
    let reader = {
        let core = Arc::clone(&core);
        let alerts = Arc::clone(&alerts);
        let running = Arc::clone(&running);
        let heavy = config.alerts.thresholds.congestion;
        thread::spawn(move || {
            let mut frames = 0u64;
            while running.load(Ordering::Relaxed) {
                let snapshot = core.snapshot();
                let congested = core
                    .congestion_levels()
                    .values()
                    .filter(|level| **level >= heavy)
                    .count();
                let active = alerts.active_alerts().len();
                frames += 1;
                if frames % 10 == 0 {
                    info!("Observer: {} vehicles, {} congested segments, {} active alerts",
                          snapshot.len(), congested, active);
                }
                thread::sleep(Duration::from_millis(100));
            }
            frames
        })
    };

    let dt = config.simulation.dt;
    let steps = (args.duration / dt).ceil() as u64;
    let start_time = Instant::now();

    info!("Running {} ticks of {:.4}s...", steps, dt);
    for step in 0..steps {
        core.update(dt);

        if let Some(feed) = feed.as_mut() {
            feed.poll(&core, dt as f32)?;
        }

        let ticks_per_second = (1.0 / dt).round() as u64;
        if ticks_per_second > 0 && step % ticks_per_second == 0 {
            info!("t={:.1}s: {} vehicles, {} active alerts",
                  core.elapsed(), core.vehicle_count(), alerts.active_alerts().len());
        }

        // Sleep to keep the reader thread in step with simulated time
        thread::sleep(Duration::from_secs_f64(dt));
    }

    running.store(false, Ordering::Relaxed);
    let observed = reader.join().map_err(|_| anyhow::anyhow!("Reader thread panicked"))?;

    // Final statistics
    info!("Simulation completed in {:.2}s wall time", start_time.elapsed().as_secs_f64());
    info!("Simulated: {:.1}s, reader frames: {}", core.elapsed(), observed);
    info!("Segments with history: {}", core.segment_stats().len());
    for alert in alerts.active_alerts() {
        info!("Active alert: {}", alert.message);
    }

    Ok(())
}
