//! Collaborator seams for frame acquisition and target detection.
//!
//! The real capture backend and inference engine live outside this
//! repository; the control loop only ever talks to the [`Camera`] and
//! [`Detector`] traits. The synthetic implementations here let the binary
//! run end-to-end without hardware: the camera fabricates blank frames at
//! the configured rate and the detector sweeps a phantom target across
//! them.

use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use rand::rngs::ThreadRng;
use spin_sleep::SpinSleeper;
use tracing::info;

use fishcar_motion::DetectionResult;

use crate::config::{CameraConfig, DetectorConfig};

/// One camera frame. The pixel payload is opaque to the control pipeline;
/// only the dimensions matter to the mapper's normalization.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel payload, unused by the pipeline itself.
    pub data: Vec<u8>,
}

/// A source of frames.
pub trait Camera {
    /// Acquire the device. Failure here is fatal at startup.
    fn open(&mut self) -> Result<()>;
    /// One frame, or `None` on a transient miss.
    fn read(&mut self) -> Option<Frame>;
    /// Release the device. Best-effort, called during shutdown.
    fn close(&mut self);
}

/// A target detector.
pub trait Detector {
    /// Run inference over one frame.
    fn detect(&mut self, frame: &Frame) -> DetectionResult;
}

/// Frame source that fabricates blank frames at the configured rate.
pub struct SyntheticCamera {
    config: CameraConfig,
    sleeper: SpinSleeper,
    open: bool,
}

impl SyntheticCamera {
    /// Construct a closed synthetic camera.
    pub fn new(config: CameraConfig) -> Self {
        SyntheticCamera {
            config,
            sleeper: SpinSleeper::default(),
            open: false,
        }
    }
}

impl Camera for SyntheticCamera {
    fn open(&mut self) -> Result<()> {
        info!(
            width = self.config.width,
            height = self.config.height,
            fps = self.config.fps,
            "synthetic camera opened"
        );
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        if self.config.fps > 0 {
            self.sleeper
                .sleep(Duration::from_secs_f64(1.0 / f64::from(self.config.fps)));
        }
        Some(Frame {
            width: self.config.width,
            height: self.config.height,
            data: Vec::new(),
        })
    }

    fn close(&mut self) {
        if self.open {
            info!("synthetic camera closed");
        }
        self.open = false;
    }
}

/// Detector stand-in: a phantom target sweeps across the frame on a fixed
/// period, with a little pixel jitter so the pipeline sees realistic noise.
pub struct SweepDetector {
    config: DetectorConfig,
    start: Instant,
    rng: ThreadRng,
}

impl SweepDetector {
    /// Construct a sweep detector starting its cycle now.
    pub fn new(config: DetectorConfig) -> Self {
        SweepDetector {
            config,
            start: Instant::now(),
            rng: rand::rng(),
        }
    }
}

impl Detector for SweepDetector {
    fn detect(&mut self, frame: &Frame) -> DetectionResult {
        let period = self.config.period.max(1.0);
        let phase = self.start.elapsed().as_secs_f64() / period * std::f64::consts::TAU;
        let cx = (0.5 + 0.45 * phase.sin()) * f64::from(frame.width)
            + self.rng.random_range(-2.0..2.0);
        let cy = f64::from(frame.height) / 2.0 + self.rng.random_range(-2.0..2.0);
        let half = 20;
        DetectionResult::target(
            (cx, cy),
            (
                cx as i32 - half,
                cy as i32 - half,
                cx as i32 + half,
                cy as i32 + half,
            ),
            self.config.confidence,
        )
    }
}
