#![warn(missing_docs)]
#![doc = "Value types and pure control stages for a mecanum-wheeled, camera-guided rover."]
#![doc = ""]
#![doc = "This crate holds the two stateless stages of the motion pipeline: [`MotionMapper`],"]
#![doc = "which turns a detection result into a desired velocity vector, and [`SafetyArbiter`],"]
#![doc = "which clamps that vector against controller telemetry before it goes on the wire."]

use core::fmt;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod arbiter;
pub mod mapper;

pub use arbiter::SafetyArbiter;
pub use mapper::{MapperConfig, MotionMapper};

/// One detector inference over a single frame.
///
/// Produced once per control-loop iteration and discarded at the end of it.
/// `center` and `bbox` are pixel coordinates in the frame the detector ran on.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResult {
    /// Whether a target was found in the frame.
    pub has_target: bool,
    /// Pixel-space center `(x, y)` of the best detection.
    pub center: Option<(f64, f64)>,
    /// Pixel-space bounding box `(x1, y1, x2, y2)` of the best detection.
    pub bbox: Option<(i32, i32, i32, i32)>,
    /// Detector confidence for the best detection.
    pub confidence: Option<f64>,
}

impl DetectionResult {
    /// The "nothing in frame" result.
    pub const fn none() -> Self {
        DetectionResult {
            has_target: false,
            center: None,
            bbox: None,
            confidence: None,
        }
    }

    /// A positive detection at the given pixel center.
    pub const fn target(center: (f64, f64), bbox: (i32, i32, i32, i32), confidence: f64) -> Self {
        DetectionResult {
            has_target: true,
            center: Some(center),
            bbox: Some(bbox),
            confidence: Some(confidence),
        }
    }
}

/// A body-frame velocity command in normalized speed units.
///
/// `active` reports whether the platform should move at all. The raw mapper
/// output may carry nonzero components alongside `active = false` only in the
/// zero vector; the arbiter's output is what actually reaches the wire, and
/// inactive vectors are always transmitted as all zeros.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionVector {
    /// Lateral velocity (positive = right), normalized.
    pub vx: f64,
    /// Longitudinal velocity (positive = forward), normalized.
    pub vy: f64,
    /// Rotational velocity (positive = counter-clockwise), normalized.
    pub omega: f64,
    /// Whether the platform should be moving.
    pub active: bool,
}

impl MotionVector {
    /// Construct a vector.
    pub const fn new(vx: f64, vy: f64, omega: f64, active: bool) -> Self {
        MotionVector {
            vx,
            vy,
            omega,
            active,
        }
    }

    /// The all-zero, inactive vector.
    pub const fn idle() -> Self {
        MotionVector::new(0.0, 0.0, 0.0, false)
    }
}

impl fmt::Display for MotionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(vx: {:.2}, vy: {:.2}, ω: {:.2}, {})",
            self.vx,
            self.vy,
            self.omega,
            if self.active { "active" } else { "idle" }
        )
    }
}

/// Limit-switch states reported by the wheel controller.
///
/// A `true` field means the switch is asserted: the platform has reached the
/// travel boundary in that direction.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitSwitches {
    /// Forward travel boundary reached.
    pub front: bool,
    /// Reverse travel boundary reached.
    pub rear: bool,
    /// Left travel boundary reached.
    pub left: bool,
    /// Right travel boundary reached.
    pub right: bool,
}

impl LimitSwitches {
    /// All switches released.
    pub const fn clear() -> Self {
        LimitSwitches {
            front: false,
            rear: false,
            left: false,
            right: false,
        }
    }

    /// Whether any switch is asserted.
    pub const fn any(&self) -> bool {
        self.front || self.rear || self.left || self.right
    }
}

/// Latest telemetry snapshot from the wheel controller.
///
/// `timestamp` is the local receipt instant of the last update, never a
/// remote clock: the receiving side is the clock authority, and the watchdog
/// measures staleness from here.
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    /// Local monotonic instant of the last telemetry update.
    pub timestamp: Instant,
    /// Limit-switch states as of that update.
    pub limits: LimitSwitches,
}

impl ControllerStatus {
    /// A fresh status with all switches released.
    pub fn new() -> Self {
        ControllerStatus {
            timestamp: Instant::now(),
            limits: LimitSwitches::clear(),
        }
    }

    /// Age of the snapshot relative to now.
    pub fn age(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

impl Default for ControllerStatus {
    fn default() -> Self {
        ControllerStatus::new()
    }
}
