//! Error types for establishing the serial link.
//!
//! Only link establishment can fail loudly: everything after `open` is
//! absorbed locally (dropped writes, a terminated reader) and surfaces to
//! the rest of the system solely through telemetry staleness.

use thiserror::Error;

/// Failures while establishing the serial link.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial device could not be opened.
    #[error("failed to open serial port {port}: {source}")]
    Open {
        /// Device path that was attempted.
        port: String,
        /// Underlying serial error.
        #[source]
        source: serialport::Error,
    },
    /// The device handle could not be cloned for the reader thread.
    #[error("failed to clone serial port handle")]
    CloneHandle(#[source] serialport::Error),
    /// The reader thread could not be spawned.
    #[error("failed to spawn serial reader thread")]
    SpawnReader(#[source] std::io::Error),
}
