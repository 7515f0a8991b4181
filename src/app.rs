//! Control loop composition.
//!
//! One cycle per delivered frame, back-to-back with no fixed period: the
//! cadence is bounded by the camera and the detector, both blocking calls
//! on this thread. The serial reader is the only other thread in the
//! process and touches nothing here except the link's status cell.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use fishcar_link::SerialLink;
use fishcar_motion::{DetectionResult, MotionMapper, MotionVector, SafetyArbiter};
use fishcar_trajectory::TrajectoryTracker;

use crate::vision::{Camera, Detector, Frame};

/// Observes each completed cycle; the on-screen visualizer plugs in here.
pub trait CycleObserver {
    /// Called with the frame, the detection, and the arbitrated vector
    /// after a cycle finishes.
    fn cycle(&mut self, frame: &Frame, detection: &DetectionResult, vector: &MotionVector);
}

/// Observer for headless runs.
pub struct NullObserver;

impl CycleObserver for NullObserver {
    fn cycle(&mut self, _frame: &Frame, _detection: &DetectionResult, _vector: &MotionVector) {}
}

/// Heartbeat cadence: at most one `PING` per interval, measured from the
/// previous one. A nonpositive interval disables heartbeats entirely.
struct HeartbeatSchedule {
    interval: Option<Duration>,
    last: Instant,
}

impl HeartbeatSchedule {
    fn new(interval_secs: f64) -> Self {
        HeartbeatSchedule {
            interval: (interval_secs > 0.0).then(|| Duration::from_secs_f64(interval_secs)),
            last: Instant::now(),
        }
    }

    /// Whether a heartbeat is due at `now`; marks it sent when it is.
    fn due(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        if now.saturating_duration_since(self.last) >= interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// The composition root: camera, detector, mapper, arbiter, link, tracker.
pub struct ControlLoop {
    camera: Box<dyn Camera>,
    detector: Box<dyn Detector>,
    mapper: MotionMapper,
    arbiter: SafetyArbiter,
    link: SerialLink,
    tracker: Option<TrajectoryTracker>,
    save_path: Option<PathBuf>,
    observer: Box<dyn CycleObserver>,
    heartbeat: HeartbeatSchedule,
    running: Arc<AtomicBool>,
}

impl ControlLoop {
    /// Assemble a loop without trajectory recording, heartbeats, or an
    /// observer; the `with_*` builders add those.
    pub fn new(
        camera: Box<dyn Camera>,
        detector: Box<dyn Detector>,
        mapper: MotionMapper,
        arbiter: SafetyArbiter,
        link: SerialLink,
        running: Arc<AtomicBool>,
    ) -> Self {
        ControlLoop {
            camera,
            detector,
            mapper,
            arbiter,
            link,
            tracker: None,
            save_path: None,
            observer: Box::new(NullObserver),
            heartbeat: HeartbeatSchedule::new(0.0),
            running,
        }
    }

    /// Enable heartbeats; an interval `<= 0` seconds suppresses them.
    pub fn with_heartbeat(mut self, interval_secs: f64) -> Self {
        self.heartbeat = HeartbeatSchedule::new(interval_secs);
        self
    }

    /// Enable trajectory recording, optionally persisted on shutdown.
    pub fn with_tracker(mut self, tracker: TrajectoryTracker, save_path: Option<PathBuf>) -> Self {
        self.tracker = Some(tracker);
        self.save_path = save_path;
        self
    }

    /// Attach a cycle observer.
    pub fn with_observer(mut self, observer: Box<dyn CycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The trajectory tracker, when recording is enabled. The visualizer
    /// reads retained points through this.
    pub fn tracker(&self) -> Option<&TrajectoryTracker> {
        self.tracker.as_ref()
    }

    /// Run cycles until the flag clears. The flag is checked between
    /// iterations only; an iteration always completes once started.
    pub fn run(&mut self) {
        info!("control loop started");
        while self.running.load(Ordering::SeqCst) {
            self.cycle();
        }
        info!("control loop stopped");
    }

    /// One full iteration: frame, detection, mapping, arbitration,
    /// transmission, trajectory, heartbeat, observer.
    pub fn cycle(&mut self) {
        let Some(frame) = self.camera.read() else {
            // Transient: no frame this time around.
            debug!("no frame available, retrying shortly");
            std::thread::sleep(Duration::from_millis(10));
            return;
        };

        let detection = self.detector.detect(&frame);
        let mapped = self.mapper.calculate(&detection);
        let safe = self.arbiter.apply(mapped, &self.link.read_status());
        self.link.send_vector(&safe);

        if let Some(tracker) = self.tracker.as_mut() {
            tracker.update(&safe);
        }

        if self.heartbeat.due(Instant::now()) {
            self.link.send_heartbeat();
        }

        self.observer.cycle(&frame, &detection, &safe);
    }

    /// Ordered, best-effort teardown: persist the trajectory, close the
    /// link (joins the reader), close the camera. A failure in one step
    /// never skips the rest.
    pub fn shutdown(&mut self) {
        info!("shutting down");
        if let (Some(tracker), Some(path)) = (self.tracker.as_ref(), self.save_path.as_ref()) {
            if !tracker.is_empty() {
                info!(points = tracker.len(), path = %path.display(), "saving trajectory");
                if let Err(err) = tracker.save(path) {
                    warn!(%err, "failed to save trajectory");
                }
            }
        }
        self.link.close();
        self.camera.close();
        info!("shutdown complete");
    }
}
