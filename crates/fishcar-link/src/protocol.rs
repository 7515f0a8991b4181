//! Line protocol between the host and the wheel controller.
//!
//! Everything on the wire is newline-terminated ASCII. Host to controller:
//! `V <vx> <vy> <omega>` velocity commands and `PING` heartbeats. Controller
//! to host: `STATUS` limit-switch reports and `PONG` heartbeat acks.

use fishcar_motion::{LimitSwitches, MotionVector};

/// Fixed-point scale applied to vector components before transmission.
pub const COMMAND_SCALE: f64 = 100.0;
/// Magnitude bound for encoded components.
pub const COMMAND_LIMIT: i32 = 127;

/// Encode an arbitrated vector as a `V` command line.
///
/// Inactive vectors always encode as `V 0 0 0`, whatever their components
/// carry; active components are scaled by [`COMMAND_SCALE`], rounded, and
/// clamped into `[-COMMAND_LIMIT, COMMAND_LIMIT]`.
pub fn encode_vector(vector: &MotionVector) -> String {
    if !vector.active {
        return "V 0 0 0\n".to_owned();
    }
    format!(
        "V {} {} {}\n",
        scale_component(vector.vx),
        scale_component(vector.vy),
        scale_component(vector.omega)
    )
}

/// The heartbeat line.
pub fn encode_heartbeat() -> &'static str {
    "PING\n"
}

fn scale_component(value: f64) -> i32 {
    // `as` saturates for out-of-range floats and maps NaN to 0.
    let scaled = (value * COMMAND_SCALE).round() as i32;
    scaled.clamp(-COMMAND_LIMIT, COMMAND_LIMIT)
}

/// A successfully parsed controller line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerLine {
    /// A `STATUS` report carrying the four limit switches.
    Status(LimitSwitches),
    /// A `PONG` heartbeat acknowledgment.
    Pong,
}

/// Parse one line from the controller.
///
/// A `STATUS` line needs at least five whitespace-separated tokens and all
/// four of `front`, `back`, `left`, `right` as `key=0|1` pairs; token order
/// is irrelevant and unknown tokens are ignored. The controller's `back` is
/// our `rear`. Returns `None` for anything unrecognized or malformed; the
/// caller decides how loudly to log.
pub fn parse_line(line: &str) -> Option<ControllerLine> {
    let line = line.trim();
    if line == "PONG" {
        return Some(ControllerLine::Pong);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"STATUS") {
        return None;
    }
    if tokens.len() < 5 {
        return None;
    }

    let mut front = None;
    let mut rear = None;
    let mut left = None;
    let mut right = None;
    for token in &tokens[1..] {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let asserted = match value {
            "1" => true,
            "0" => false,
            _ => continue,
        };
        match key {
            "front" => front = Some(asserted),
            "back" => rear = Some(asserted),
            "left" => left = Some(asserted),
            "right" => right = Some(asserted),
            _ => {}
        }
    }

    Some(ControllerLine::Status(LimitSwitches {
        front: front?,
        rear: rear?,
        left: left?,
        right: right?,
    }))
}
