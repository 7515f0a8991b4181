//! Half-duplex serial link to the wheel controller.
//!
//! The link owns exactly one open connection for the process lifetime. The
//! control loop writes velocity commands and heartbeats on its own thread;
//! a dedicated background thread performs blocking line reads and commits
//! parsed status lines into a shared latest-value cell. The two directions
//! are serialized at the device driver, not here.
//!
//! Failure model: a link that is not open swallows writes (logged, never an
//! error), malformed inbound lines are dropped, and a read fault terminates
//! the reader while leaving the last status in place. Staleness is declared
//! by the safety arbiter's watchdog, not by this crate.

use std::io::{BufRead, BufReader, ErrorKind};
use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use fishcar_motion::{ControllerStatus, MotionVector};

pub mod discover;
pub mod error;
pub mod protocol;

pub use error::LinkError;
use protocol::ControllerLine;

/// Serial link settings, one config-file section. Durations are seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Device path, or `"auto"` to use [`discover::first_candidate`].
    pub port: String,
    /// Line rate in baud.
    pub baudrate: u32,
    /// Per-read timeout for the background reader, seconds.
    pub timeout: f64,
    /// Heartbeat cadence, seconds; `<= 0` disables heartbeats entirely.
    /// Consumed by the control loop, carried here so the whole serial
    /// section deserializes in one place.
    pub heartbeat_interval: f64,
    /// Maximum telemetry age before commands are forced to zero, seconds.
    /// Consumed by the safety arbiter.
    pub watchdog_timeout: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            port: "auto".to_owned(),
            baudrate: 115_200,
            timeout: 0.5,
            heartbeat_interval: 1.0,
            watchdog_timeout: 2.0,
        }
    }
}

/// The serial link to the wheel controller.
///
/// Constructed closed; `open` establishes the connection and starts the
/// reader, `close` stops the reader with a bounded join and releases the
/// device. Sending on a closed link is a logged no-op by design, so
/// transient disconnects never take down the control loop.
pub struct SerialLink {
    config: LinkConfig,
    port: Option<Box<dyn serialport::SerialPort>>,
    status: Arc<Mutex<ControllerStatus>>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Construct a closed link.
    pub fn new(config: LinkConfig) -> Self {
        SerialLink {
            config,
            port: None,
            status: Arc::new(Mutex::new(ControllerStatus::new())),
            running: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Borrow the link settings.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Whether the device is currently open.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Open the device and start the background reader.
    ///
    /// Failure here is fatal at startup; there is no retry loop.
    pub fn open(&mut self) -> Result<(), LinkError> {
        info!(
            port = %self.config.port,
            baudrate = self.config.baudrate,
            "opening serial link"
        );
        let port = serialport::new(&self.config.port, self.config.baudrate)
            .timeout(Duration::from_secs_f64(self.config.timeout.max(0.01)))
            .open()
            .map_err(|source| LinkError::Open {
                port: self.config.port.clone(),
                source,
            })?;
        let reader_port = port.try_clone().map_err(LinkError::CloneHandle)?;

        // The watchdog measures staleness from link-up until the first
        // status line arrives.
        *self.status.lock() = ControllerStatus::new();

        self.running.store(true, Ordering::SeqCst);
        let status = Arc::clone(&self.status);
        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("serial-reader".into())
            .spawn(move || read_loop(BufReader::new(reader_port), &status, &running))
            .map_err(LinkError::SpawnReader)?;
        self.reader = Some(handle);
        self.port = Some(port);
        Ok(())
    }

    /// Encode and write an arbitrated vector.
    ///
    /// A closed link drops the command with a debug log; a write fault on an
    /// open link is logged and absorbed.
    pub fn send_vector(&mut self, vector: &MotionVector) {
        let line = protocol::encode_vector(vector);
        self.write_line(&line);
    }

    /// Write a `PING` heartbeat. Cadence is owned by the caller.
    pub fn send_heartbeat(&mut self) {
        self.write_line(protocol::encode_heartbeat());
    }

    /// Latest fully committed status snapshot.
    pub fn read_status(&self) -> ControllerStatus {
        self.status.lock().clone()
    }

    /// Stop the reader and release the device.
    ///
    /// The reader is joined with a bounded wait; if it does not stop in time
    /// it is abandoned rather than blocking process exit.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            let deadline = Instant::now() + self.join_grace();
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!("serial reader did not stop in time, abandoning it");
            }
        }
        if self.port.take().is_some() {
            info!("serial link closed");
        }
    }

    /// The reader wakes at least once per read timeout, so twice that plus
    /// slack bounds the join.
    fn join_grace(&self) -> Duration {
        Duration::from_secs_f64(self.config.timeout.max(0.01) * 2.0 + 0.1)
    }

    fn write_line(&mut self, line: &str) {
        let Some(port) = self.port.as_mut() else {
            debug!("serial link not open, dropping outbound line");
            return;
        };
        if let Err(err) = port.write_all(line.as_bytes()) {
            warn!(%err, "serial write failed");
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader loop: blocking line reads with a bounded timeout, committing each
/// fully parsed status line to the shared cell.
///
/// Generic over `BufRead` so the parse-and-commit path is exercisable
/// without a device. Timeouts are routine and keep the loop responsive to
/// the stop flag; any other I/O fault ends the loop, leaving the last known
/// status in place for the watchdog to age out.
fn read_loop<R: BufRead>(mut reader: R, status: &Mutex<ControllerStatus>, running: &AtomicBool) {
    let mut line = String::new();
    while running.load(Ordering::SeqCst) {
        match reader.read_line(&mut line) {
            Ok(0) => {
                debug!("serial stream ended");
                break;
            }
            Ok(_) => {
                handle_line(&line, status);
                line.clear();
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                // Bytes already appended to `line` stay put: the next read
                // resumes the same in-flight line.
                continue;
            }
            Err(err) => {
                warn!(%err, "serial read failed, stopping reader");
                break;
            }
        }
    }
}

fn handle_line(line: &str, status: &Mutex<ControllerStatus>) {
    match protocol::parse_line(line) {
        Some(ControllerLine::Status(limits)) => {
            // Replace the whole snapshot under the lock: readers only ever
            // see fully written statuses. Timestamp is local receipt time.
            *status.lock() = ControllerStatus {
                timestamp: Instant::now(),
                limits,
            };
        }
        Some(ControllerLine::Pong) => {
            status.lock().timestamp = Instant::now();
        }
        None => {
            debug!(line = line.trim(), "dropping unrecognized controller line");
        }
    }
}
