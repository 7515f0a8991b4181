//! Safety arbitration between the desired velocity and controller telemetry.
//!
//! The arbiter has no persisted mode: each call re-derives one of three
//! conceptual states (active, limit-braking, watchdog-halted) purely from the
//! current inputs. Arbitration order matters: stale telemetry overrides
//! everything, including an otherwise safe limit-clamped command, because the
//! limit state itself may be stale.

use std::time::Duration;

use crate::{ControllerStatus, MotionVector};

/// Clamps a requested velocity against limit switches and telemetry age.
#[derive(Debug, Clone)]
pub struct SafetyArbiter {
    watchdog_timeout: Duration,
}

impl SafetyArbiter {
    /// Construct an arbiter with the given maximum telemetry age.
    pub const fn new(watchdog_timeout: Duration) -> Self {
        SafetyArbiter { watchdog_timeout }
    }

    /// The configured maximum telemetry age.
    pub fn watchdog_timeout(&self) -> Duration {
        self.watchdog_timeout
    }

    /// Arbitrate a requested vector against the latest controller status.
    ///
    /// Telemetry older than the watchdog timeout forces the all-zero
    /// inactive vector. Otherwise each asserted limit switch zeroes only the
    /// axis component that would drive further into it; rotation is never
    /// touched, so a rover pinned between opposing limits can still spin in
    /// place. If limit braking leaves both linear components at exactly
    /// zero, the output reports `active = false`.
    pub fn apply(&self, vector: MotionVector, status: &ControllerStatus) -> MotionVector {
        if status.age() > self.watchdog_timeout {
            return MotionVector::idle();
        }

        let mut vx = vector.vx;
        let mut vy = vector.vy;
        let limits = status.limits;
        if limits.front && vy > 0.0 {
            vy = 0.0;
        }
        if limits.rear && vy < 0.0 {
            vy = 0.0;
        }
        if limits.left && vx < 0.0 {
            vx = 0.0;
        }
        if limits.right && vx > 0.0 {
            vx = 0.0;
        }

        if vx == 0.0 && vy == 0.0 {
            return MotionVector::new(0.0, 0.0, vector.omega, false);
        }

        MotionVector::new(vx, vy, vector.omega, vector.active)
    }
}
