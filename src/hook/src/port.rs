//! Loopback port probing, for services that pick their listening port at
//! startup.

use std::net::{Ipv4Addr, TcpListener};

use sysdefs::constants::PORT_PROBE_ATTEMPTS;

/// Whether a TCP socket can be bound to `127.0.0.1:port` right now.
///
/// The probe socket is closed again before returning, so the answer can be
/// stale by the time the caller binds.
#[must_use]
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// The first free port among `start` and the `PORT_PROBE_ATTEMPTS - 1`
/// ports after it.
#[must_use]
pub fn find_free_port(start: u16) -> Option<u16> {
    for offset in 0..PORT_PROBE_ATTEMPTS {
        let port = start.checked_add(offset)?;
        if is_port_free(port) {
            return Some(port);
        }
    }
    log::debug!(
        "port: nothing free in {}..{}",
        start,
        start.saturating_add(PORT_PROBE_ATTEMPTS)
    );
    None
}
