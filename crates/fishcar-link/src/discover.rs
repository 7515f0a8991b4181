//! Serial port discovery.
//!
//! The controller usually shows up as a USB CDC adapter; candidates are
//! listed USB-first so `first_candidate` lands on it without configuration.

use serialport::SerialPortType;
use tracing::{debug, info};

/// List ports that look like a controller link, USB devices first.
pub fn candidate_ports() -> Vec<String> {
    let mut ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(err) => {
            debug!(%err, "serial port enumeration failed");
            return Vec::new();
        }
    };
    ports.sort_by_key(|port| match port.port_type {
        SerialPortType::UsbPort(_) => 0,
        _ => 1,
    });
    ports.into_iter().map(|port| port.port_name).collect()
}

/// The most likely controller port, if any device is present.
pub fn first_candidate() -> Option<String> {
    let port = candidate_ports().into_iter().next()?;
    info!(%port, "selected serial port candidate");
    Some(port)
}
