use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fishcar::app::ControlLoop;
use fishcar::config::{AppConfig, DEFAULT_CONFIG_PATH, load_config};
use fishcar::vision::{Camera, SweepDetector, SyntheticCamera};
use fishcar_link::{SerialLink, discover};
use fishcar_motion::{MotionMapper, SafetyArbiter};
use fishcar_trajectory::TrajectoryTracker;

fn main() {
    if let Err(err) = run() {
        // The subscriber may not be installed yet when this fires.
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(config = %config_path.display(), "fishcar starting");

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        warn!("shutdown signal received");
        flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    let mut control = build(&config, Arc::clone(&running))?;
    control.run();
    control.shutdown();
    info!("exited cleanly");
    Ok(())
}

/// Open the required resources and assemble the control loop.
///
/// Startup failures are fatal: whatever was already opened is closed again
/// before the error propagates.
fn build(config: &AppConfig, running: Arc<AtomicBool>) -> anyhow::Result<ControlLoop> {
    let mut link_config = config.serial.clone();
    if link_config.port == "auto" {
        link_config.port =
            discover::first_candidate().context("no serial port found during discovery")?;
    }

    let mut camera = SyntheticCamera::new(config.camera.clone());
    camera.open().context("failed to open camera")?;

    let mut link = SerialLink::new(link_config);
    if let Err(err) = link.open() {
        camera.close();
        return Err(err).context("failed to open serial link");
    }

    let mapper = MotionMapper::new(config.motion.clone());
    let arbiter = SafetyArbiter::new(Duration::from_secs_f64(config.serial.watchdog_timeout));
    let detector = SweepDetector::new(config.detector.clone());

    let mut control = ControlLoop::new(
        Box::new(camera),
        Box::new(detector),
        mapper,
        arbiter,
        link,
        running,
    )
    .with_heartbeat(config.serial.heartbeat_interval);

    if config.trajectory.enabled {
        info!(
            max_points = config.trajectory.max_points,
            sample_interval = config.trajectory.sample_interval,
            "trajectory recording enabled"
        );
        let tracker = TrajectoryTracker::new(
            config.trajectory.max_points,
            Duration::from_secs_f64(config.trajectory.sample_interval),
        );
        control = control.with_tracker(tracker, config.trajectory.save_path.clone());
    }

    Ok(control)
}
