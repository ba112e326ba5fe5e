// Hook Library - blocking-style syscalls over non-blocking sockets
//
// Every call a fiber makes through `Hooks` consults the fdctx registry to
// decide between going straight to the kernel and parking on the reactor
// until its descriptor is ready.

//! Syscall hooks for the fiber runtime.
//!
//! Build a [`Hooks`] once, switch the hooks on for each scheduler thread
//! with [`set_hook_enable`], and route the blocking calls (`connect`,
//! `accept`, `read`, `write`, `sleep`, `close`, ...) through it.  Calls
//! return non-negative on success and `-errno` on failure.

// ********************** CLIPPY DISCUSSION **************************** //
// Same policy as fdctx: the fullest feedback, as warnings only.
#![warn(clippy::all, missing_docs, clippy::pedantic, clippy::cargo)]
// Syscall results are isize / i32 and byte counts are usize; the kernel
// keeps them in range.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
// ********************* END CLIPPY DISCUSSION ************************* //

pub mod config;
pub mod fs_calls;
pub mod init;
pub mod net_calls;
pub mod net_helpers;
pub mod port;
pub mod reactor;
pub mod sys_calls;

pub use config::{is_hook_enable, set_hook_enable, HookConfig};
pub use init::Hooks;
pub use port::{find_free_port, is_port_free};
pub use reactor::{Interest, PollReactor, Reactor, WaitResult};

pub use fdctx::{FdCtx, FdManager, TimeoutKind, NO_TIMEOUT};

#[cfg(test)]
mod tests;
