//! Errno values and the helpers every hooked call uses to report failure.
//!
//! Hooked calls follow the kernel's shape: a non-negative value on success
//! and the negated errno on failure.  Registry operations never go through
//! here; they resolve their conditions locally.

// Let's not have clippy warn for EAGAIN, etc.
#![allow(clippy::upper_case_acronyms)]

#[doc(hidden)]
macro_rules! reversible_enum {
    ($(#[$settings: meta])* $visibility: vis enum $enumname:ident {
        $($valuename: ident = $value: literal,)*
    }) => {
        $(#[$settings])*
        $visibility enum $enumname {
            $($valuename = $value,)*
        }

        impl $enumname {
            /// Maps a raw errno back to the enum, if it is one we surface.
            $visibility fn from_discriminant(v: i32) -> Option<Self> {
                match v {
                    $($value => Some($enumname::$valuename),)*
                    _ => None,
                }
            }
        }
    }
}

reversible_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(i32)]
    /// Errno values the hook layer returns
    #[non_exhaustive]
    pub enum Errno {
        EPERM = 1,          // Operation not permitted
        EINTR = 4,          // Interrupted system call
        EIO = 5,            // I/O error
        EBADF = 9,          // Bad file number
        EAGAIN = 11,        // Try again
        ENOMEM = 12,        // Out of memory
        EFAULT = 14,        // Bad address
        EINVAL = 22,        // Invalid argument
        EMFILE = 24,        // Too many open files
        EPIPE = 32,         // Broken pipe
        ENOTSOCK = 88,      // Socket operation on non-socket
        EADDRINUSE = 98,    // Address already in use
        ECONNRESET = 104,   // Connection reset by peer
        ENOTCONN = 107,     // Transport endpoint is not connected
        ETIMEDOUT = 110,    // Connection timed out
        ECONNREFUSED = 111, // Connection refused
        EALREADY = 114,     // Operation already in progress
        EINPROGRESS = 115,  // Operation now in progress
        ECANCELED = 125,    // Operation Canceled
    }
}

/// Returns the calling thread's errno as left by the last libc call.
pub fn get_errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Overwrites the calling thread's errno.  Used when a hooked call has to
/// report an error the kernel never produced (e.g. a timed out wait).
pub fn set_errno(errno: i32) {
    unsafe {
        *libc::__errno_location() = errno;
    }
}

/// Turns a raw errno from a failed libc call into the negative return value
/// of a hooked call.
pub fn handle_errno(e: i32, syscall: &str) -> i32 {
    match Errno::from_discriminant(e) {
        Some(known) => log::debug!("{}: kernel returned {:?}", syscall, known),
        None => log::debug!("{}: kernel returned errno {}", syscall, e),
    }
    -e
}

/// Reports an error the hook layer decided on itself.  errno is set too,
/// so C-style callers that check it see the same error.
pub fn syscall_error(e: Errno, syscall: &str, message: &str) -> i32 {
    log::debug!("{}: {} ({:?})", syscall, message, e);
    set_errno(e as i32);
    -(e as i32)
}
