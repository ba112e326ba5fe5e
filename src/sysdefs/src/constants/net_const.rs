//! Networking constants used by the hook layer.
//!
//! The socket option identifiers are the kernel's; they double as the
//! direction discriminator for per-descriptor timeouts.

pub use libc::{FIONBIO, F_GETFL, F_SETFL, O_NONBLOCK, SOL_SOCKET, SO_ERROR, SO_RCVTIMEO, SO_SNDTIMEO};

/// Connect timeout applied when the application never configured one.
pub const DEFAULT_CONNECT_TIMEOUT_MS: i64 = 5000;

/// How many consecutive ports `find_free_port` probes before giving up.
pub const PORT_PROBE_ATTEMPTS: u16 = 30;

/// Upper bound on a single `poll` slice inside the thread-backed reactor,
/// so that waiters notice cancellation promptly.
pub const POLL_SLICE_MS: i64 = 50;
