//! Typed application configuration.
//!
//! One TOML file, one struct per section, deserialized in a single pass.
//! Sections owned by library crates ([`MapperConfig`], [`LinkConfig`],
//! [`TrajectoryConfig`]) deserialize straight into those crates' types.

use std::path::Path;

use anyhow::Context;
use config::{Config, File, FileFormat};
use serde::Deserialize;

use fishcar_link::LinkConfig;
use fishcar_motion::MapperConfig;
use fishcar_trajectory::TrajectoryConfig;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Camera section: frame geometry and pacing for the frame source.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target frame rate; `0` disables pacing.
    pub fps: u32,
}

/// Detector section: parameters for the synthetic stand-in detector.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Confidence reported with each synthetic detection.
    pub confidence: f64,
    /// Seconds per full sweep of the synthetic target across the frame.
    pub period: f64,
}

/// Logging section.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter directive; `RUST_LOG` overrides it.
    pub level: String,
}

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `[camera]`
    pub camera: CameraConfig,
    /// `[detector]`
    pub detector: DetectorConfig,
    /// `[motion]`
    pub motion: MapperConfig,
    /// `[serial]`
    pub serial: LinkConfig,
    /// `[trajectory]`
    pub trajectory: TrajectoryConfig,
    /// `[logging]`
    pub logging: LoggingConfig,
}

/// Load and deserialize the configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let settings = Config::builder()
        .add_source(File::from(path.to_path_buf()).format(FileFormat::Toml).required(true))
        .build()
        .with_context(|| format!("failed to read configuration from {}", path.display()))?;
    settings
        .try_deserialize()
        .with_context(|| format!("configuration file {} is malformed", path.display()))
}
