//! This crate provides the per-descriptor context registry used by the
//! fiber runtime's syscall hooks.  Code written in ordinary blocking style
//! runs over non-blocking sockets; to make that work, every intercepted
//! call (connect, read, write, accept, close, ...) first looks up what the
//! runtime knows about its descriptor:
//!
//! - is it a socket at all, or should the call go straight to the kernel?
//! - has the kernel descriptor been switched to `O_NONBLOCK`?
//! - did the *application* ask for non-blocking semantics, or does it
//!   expect the call to block (in which case the hook suspends the fiber)?
//! - what receive / send timeouts has it configured?
//! - has the descriptor been closed while somebody was waiting on it?
//!
//! That record is an [`FdCtx`] and the table holding them is an
//! [`FdManager`].  The registry is an ordinary value: build one when the
//! runtime starts and hand a reference (or an `Arc`) to whatever needs it.

// ********************** CLIPPY DISCUSSION **************************** //
// We set base lints to give the fullest, most pedantic feedback possible.
// Though we prefer that they are just warnings during development so that
// build-denial is only enforced in CI.
//
#![warn(
    // `clippy::all` is already on by default.
    clippy::all,

    // It's always good to write as much documentation as possible
    missing_docs,

    // > clippy::pedantic lints which are rather strict or might have false positives
    clippy::pedantic,

    // > The clippy::cargo group gives you suggestions on how to improve your Cargo.toml file.
    clippy::cargo
)]
// Descriptor numbers are i32 at the syscall boundary and usize as table
// indices.  The conversions are checked where it matters.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// ********************* END CLIPPY DISCUSSION ************************* //

mod fdctx;
mod fdmanager;

pub use fdctx::{FdCtx, TimeoutKind};
pub use fdmanager::{grown_capacity, FdManager};

pub use sysdefs::constants::{FDCTX_INITIAL_CAPACITY, FDCTX_MAX_FD, NO_TIMEOUT};

/***************************** TESTS FOLLOW ******************************/
