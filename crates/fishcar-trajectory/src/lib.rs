//! Dead-reckoned trajectory history.
//!
//! [`TrajectoryTracker`] integrates the arbitrated velocity commands the
//! platform was actually sent into a pose estimate, with no external
//! position feedback: this is a velocity-command integrator, not a physical
//! simulation. Accepted samples land in a fixed-capacity ring buffer and can
//! be persisted to, and restored from, a JSON file.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use fishcar_motion::MotionVector;

/// Failures while persisting or restoring a trajectory.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    /// Filesystem access failed.
    #[error("trajectory file I/O failed")]
    Io(#[from] std::io::Error),
    /// The file contents did not match the trajectory format.
    #[error("trajectory file is malformed")]
    Format(#[from] serde_json::Error),
}

/// Trajectory settings, one config-file section. Durations are seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TrajectoryConfig {
    /// Whether recording is on at all.
    pub enabled: bool,
    /// Retention bound; the oldest point is evicted once reached.
    pub max_points: usize,
    /// Minimum spacing between accepted samples, seconds.
    pub sample_interval: f64,
    /// Where to persist the trajectory on shutdown, if anywhere.
    pub save_path: Option<PathBuf>,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        TrajectoryConfig {
            enabled: true,
            max_points: 1000,
            sample_interval: 0.1,
            save_path: None,
        }
    }
}

/// One accepted sample: pose after integration plus the commanded vector.
/// Immutable once appended. Timestamps are seconds on the tracker's own
/// monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Sample time, seconds since the tracker's epoch.
    pub timestamp: f64,
    /// Dead-reckoned x position, normalized units.
    pub x: f64,
    /// Dead-reckoned y position, normalized units.
    pub y: f64,
    /// Commanded lateral velocity at this sample.
    pub vx: f64,
    /// Commanded longitudinal velocity at this sample.
    pub vy: f64,
    /// Commanded rotational velocity at this sample.
    pub omega: f64,
    /// Whether the platform was commanded to move.
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrajectoryFile {
    points: Vec<TrajectoryPoint>,
    metadata: TrajectoryMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrajectoryMetadata {
    total_points: usize,
    /// Last-minus-first timestamp; zero with fewer than two points.
    duration: f64,
}

/// Fixed-capacity ring of trajectory points: a flat arena plus a head index.
/// Insertion order is chronological and is also the eviction order.
#[derive(Debug)]
struct PointRing {
    slots: Vec<TrajectoryPoint>,
    head: usize,
    capacity: usize,
}

impl PointRing {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        PointRing {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append a point, evicting the oldest once at capacity.
    fn push(&mut self, point: TrajectoryPoint) {
        if self.slots.len() < self.capacity {
            self.slots.push(point);
        } else {
            self.slots[self.head] = point;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    /// Oldest to newest.
    fn iter(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.slots[self.head..].iter().chain(self.slots[..self.head].iter())
    }
}

/// Integrates arbitrated velocity commands into a bounded pose history.
///
/// `update` is called once per control-loop iteration with the final
/// arbitrated vector; a sampling gate decouples integration cadence from the
/// much faster camera cadence. When the vector is inactive the pose is held,
/// with no decay and no stop-distance model.
#[derive(Debug)]
pub struct TrajectoryTracker {
    ring: PointRing,
    sample_interval: Duration,
    x: f64,
    y: f64,
    theta: f64,
    epoch: Instant,
    last_sample: Instant,
    enabled: bool,
}

impl TrajectoryTracker {
    /// Construct a tracker retaining at most `max_points` samples spaced at
    /// least `sample_interval` apart.
    pub fn new(max_points: usize, sample_interval: Duration) -> Self {
        let now = Instant::now();
        TrajectoryTracker {
            ring: PointRing::new(max_points),
            sample_interval,
            x: 0.0,
            y: 0.0,
            theta: 0.0,
            epoch: now,
            last_sample: now,
            enabled: true,
        }
    }

    /// Feed one arbitrated vector. Skipped entirely while disabled or until
    /// the sampling interval has elapsed since the last accepted sample.
    pub fn update(&mut self, vector: &MotionVector) {
        self.update_at(vector, Instant::now());
    }

    fn update_at(&mut self, vector: &MotionVector, now: Instant) {
        if !self.enabled {
            return;
        }
        let dt = now.saturating_duration_since(self.last_sample);
        if dt < self.sample_interval {
            return;
        }
        self.last_sample = now;

        if vector.active {
            self.integrate(vector, dt.as_secs_f64());
        }

        self.ring.push(TrajectoryPoint {
            timestamp: now.saturating_duration_since(self.epoch).as_secs_f64(),
            x: self.x,
            y: self.y,
            vx: vector.vx,
            vy: vector.vy,
            omega: vector.omega,
            active: vector.active,
        });
    }

    /// Forward-Euler step: rotate the body-frame command into the global
    /// frame by the current heading, then integrate position and heading.
    fn integrate(&mut self, vector: &MotionVector, dt: f64) {
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        let vx_global = vector.vx * cos_theta - vector.vy * sin_theta;
        let vy_global = vector.vx * sin_theta + vector.vy * cos_theta;
        self.x += vx_global * dt;
        self.y += vy_global * dt;
        // fmod keeps the sign, wrapping into (-2π, 2π).
        self.theta = (self.theta + vector.omega * dt) % (2.0 * PI);
    }

    /// Current dead-reckoned pose `(x, y, theta)`.
    pub fn pose(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.theta)
    }

    /// Number of retained points.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether no points are retained.
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// All retained points, oldest first.
    pub fn points(&self) -> Vec<TrajectoryPoint> {
        self.ring.iter().copied().collect()
    }

    /// The most recent `count` points, oldest first.
    pub fn recent(&self, count: usize) -> Vec<TrajectoryPoint> {
        let skip = self.ring.len().saturating_sub(count);
        self.ring.iter().skip(skip).copied().collect()
    }

    /// Drop all points and return the pose to the origin.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.x = 0.0;
        self.y = 0.0;
        self.theta = 0.0;
        self.last_sample = Instant::now();
    }

    /// Restart dead reckoning from the given pose; retained points stay.
    pub fn reset_position(&mut self, x: f64, y: f64, theta: f64) {
        self.x = x;
        self.y = y;
        self.theta = theta;
    }

    /// Turn recording on or off. While off, `update` is a no-op.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)` of the
    /// retained points; `(0, 0, 0, 0)` when empty.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut iter = self.ring.iter();
        let Some(first) = iter.next() else {
            return (0.0, 0.0, 0.0, 0.0);
        };
        let mut bounds = (first.x, first.y, first.x, first.y);
        for point in iter {
            bounds.0 = bounds.0.min(point.x);
            bounds.1 = bounds.1.min(point.y);
            bounds.2 = bounds.2.max(point.x);
            bounds.3 = bounds.3.max(point.y);
        }
        bounds
    }

    /// Persist the retained points plus summary metadata as JSON.
    pub fn save(&self, path: &Path) -> Result<(), TrajectoryError> {
        let points = self.points();
        let duration = match (points.first(), points.last()) {
            (Some(first), Some(last)) if points.len() > 1 => last.timestamp - first.timestamp,
            _ => 0.0,
        };
        let file = TrajectoryFile {
            metadata: TrajectoryMetadata {
                total_points: points.len(),
                duration,
            },
            points,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        info!(path = %path.display(), points = file.metadata.total_points, "trajectory saved");
        Ok(())
    }

    /// Restore a persisted trajectory, replacing the retained points.
    ///
    /// Dead reckoning resumes from the last restored point's position.
    /// Heading is deliberately not restored; see the project design notes.
    pub fn load(&mut self, path: &Path) -> Result<(), TrajectoryError> {
        let file: TrajectoryFile = serde_json::from_str(&fs::read_to_string(path)?)?;
        self.ring.clear();
        for point in file.points {
            self.ring.push(point);
        }
        if let Some(last) = self.ring.iter().last() {
            self.x = last.x;
            self.y = last.y;
        }
        debug!(path = %path.display(), points = self.ring.len(), "trajectory loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EPSILON: f64 = 1e-9;

    /// Drives `update_at` with a synthetic clock so dt is exact.
    struct Clock {
        epoch: Instant,
    }

    impl Clock {
        fn new(tracker: &TrajectoryTracker) -> Self {
            Clock {
                epoch: tracker.epoch,
            }
        }

        fn at(&self, secs: f64) -> Instant {
            self.epoch + Duration::from_secs_f64(secs)
        }
    }

    fn active(vx: f64, vy: f64, omega: f64) -> MotionVector {
        MotionVector::new(vx, vy, omega, true)
    }

    #[test]
    fn test_sampling_gate_skips_fast_updates() {
        let mut tracker = TrajectoryTracker::new(100, Duration::from_millis(100));
        let clock = Clock::new(&tracker);
        // 50 ms after the last sample: below the interval, rejected.
        tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(0.05));
        assert!(tracker.is_empty());
        // 100 ms: accepted.
        tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(0.1));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_straight_line_integration() {
        let mut tracker = TrajectoryTracker::new(100, Duration::from_millis(100));
        let clock = Clock::new(&tracker);
        // theta = 0: body frame and global frame coincide.
        // x += 1.0 * 0.1 per accepted sample.
        for step in 1..=5 {
            tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(step as f64 * 0.1));
        }
        let (x, y, theta) = tracker.pose();
        assert!((x - 0.5).abs() < EPSILON);
        assert!((y - 0.0).abs() < EPSILON);
        assert!((theta - 0.0).abs() < EPSILON);
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn test_heading_rotates_body_frame_into_global() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        tracker.reset_position(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let clock = Clock::new(&tracker);
        // At theta = π/2 a body-frame vx maps onto global +y:
        // vx_global = vx*cos - vy*sin = 0, vy_global = vx*sin + vy*cos = vx.
        tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(1.0));
        let (x, y, _) = tracker.pose();
        assert!((x - 0.0).abs() < EPSILON);
        assert!((y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_inactive_holds_pose_but_still_samples() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(1.0));
        let pose_before = tracker.pose();
        tracker.update_at(&MotionVector::idle(), clock.at(2.0));
        // Pose held, but the idle sample was still appended.
        assert_eq!(tracker.pose(), pose_before);
        assert_eq!(tracker.len(), 2);
        assert!(!tracker.points()[1].active);
    }

    #[test]
    fn test_theta_wraps_without_losing_sign() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        // omega = 5 rad/s for 2 s => 10 rad, fmod 2π => 10 - 2π ≈ 3.7168
        tracker.update_at(&active(0.0, 0.0, 5.0), clock.at(2.0));
        let (_, _, theta) = tracker.pose();
        assert!((theta - (10.0 % (2.0 * PI))).abs() < EPSILON);
        assert!(theta.abs() < 2.0 * PI);
    }

    #[test]
    fn test_ring_keeps_most_recent_capacity_points() {
        let mut tracker = TrajectoryTracker::new(10, Duration::ZERO);
        let clock = Clock::new(&tracker);
        for step in 1..=25 {
            tracker.update_at(&active(step as f64, 0.0, 0.0), clock.at(step as f64));
        }
        // Exactly capacity points, chronological, the most recent 25-16.
        assert_eq!(tracker.len(), 10);
        let points = tracker.points();
        let vxs: Vec<f64> = points.iter().map(|p| p.vx).collect();
        let expected: Vec<f64> = (16..=25).map(f64::from).collect();
        assert_eq!(vxs, expected);
        for pair in points.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn test_recent_returns_tail() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        for step in 1..=5 {
            tracker.update_at(&active(step as f64, 0.0, 0.0), clock.at(step as f64));
        }
        let tail = tracker.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].vx, 4.0);
        assert_eq!(tail[1].vx, 5.0);
        // Asking for more than retained returns everything.
        assert_eq!(tracker.recent(50).len(), 5);
    }

    #[test]
    fn test_bounds() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        assert_eq!(tracker.bounds(), (0.0, 0.0, 0.0, 0.0));
        tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(1.0)); // x = 1
        tracker.update_at(&active(-3.0, 1.0, 0.0), clock.at(2.0)); // x = -2, y = 1
        let (min_x, min_y, max_x, max_y) = tracker.bounds();
        assert!((min_x - (-2.0)).abs() < EPSILON);
        assert!((min_y - 0.0).abs() < EPSILON);
        assert!((max_x - 1.0).abs() < EPSILON);
        assert!((max_y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        tracker.update_at(&active(1.0, 1.0, 1.0), clock.at(1.0));
        tracker.clear();
        assert!(tracker.is_empty());
        assert_eq!(tracker.pose(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_disabled_tracker_ignores_updates() {
        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        tracker.set_enabled(false);
        tracker.update_at(&active(1.0, 0.0, 0.0), clock.at(1.0));
        assert!(tracker.is_empty());
        assert_eq!(tracker.pose(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_save_load_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "fishcar-trajectory-roundtrip-{}.json",
            std::process::id()
        ));

        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        for step in 1..=4 {
            tracker.update_at(&active(0.5, -0.25, 0.1), clock.at(step as f64));
        }
        let saved_points = tracker.points();
        let (saved_x, saved_y, _) = tracker.pose();
        tracker.save(&path).expect("save");

        let mut restored = TrajectoryTracker::new(100, Duration::ZERO);
        restored.reset_position(9.0, 9.0, 1.0);
        restored.load(&path).expect("load");

        // Points survive losslessly.
        assert_eq!(restored.points(), saved_points);
        // Position resumes from the last point; heading is not restored.
        let (x, y, theta) = restored.pose();
        assert!((x - saved_x).abs() < EPSILON);
        assert!((y - saved_y).abs() < EPSILON);
        assert!((theta - 1.0).abs() < EPSILON);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_respects_capacity() {
        let path = std::env::temp_dir().join(format!(
            "fishcar-trajectory-capacity-{}.json",
            std::process::id()
        ));

        let mut tracker = TrajectoryTracker::new(100, Duration::ZERO);
        let clock = Clock::new(&tracker);
        for step in 1..=20 {
            tracker.update_at(&active(step as f64, 0.0, 0.0), clock.at(step as f64));
        }
        tracker.save(&path).expect("save");

        let mut small = TrajectoryTracker::new(5, Duration::ZERO);
        small.load(&path).expect("load");
        // Only the 5 most recent points fit.
        assert_eq!(small.len(), 5);
        assert_eq!(small.points()[0].vx, 16.0);

        let _ = fs::remove_file(&path);
    }
}
