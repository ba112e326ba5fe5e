//  FdCtx: what the hook layer needs to know about one descriptor.
//
//      Socket-ness and the kernel's O_NONBLOCK flag are decided once, when
//      the context is built, and never change afterwards.  The bits the
//      hook layer flips at runtime (the application's non-blocking intent,
//      the closed flag, the two timeouts) are atomics so the context can be
//      handed out as a plain `Arc<FdCtx>`.

use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use sysdefs::constants::{NO_TIMEOUT, SO_RCVTIMEO, SO_SNDTIMEO};

/// Which per-descriptor timeout is meant.  Mirrors the `SO_RCVTIMEO` /
/// `SO_SNDTIMEO` socket options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    /// Receive side (read, recv, accept, ...)
    Recv,
    /// Send side (write, send, connect, ...)
    Send,
}

impl TimeoutKind {
    /// Maps a socket option name to a timeout kind.  Anything other than
    /// `SO_RCVTIMEO` / `SO_SNDTIMEO` is not a timeout option.
    #[must_use]
    pub fn from_sockopt(optname: i32) -> Option<Self> {
        match optname {
            SO_RCVTIMEO => Some(TimeoutKind::Recv),
            SO_SNDTIMEO => Some(TimeoutKind::Send),
            _ => None,
        }
    }

    /// The socket option this kind corresponds to.
    #[must_use]
    pub fn as_sockopt(self) -> i32 {
        match self {
            TimeoutKind::Recv => SO_RCVTIMEO,
            TimeoutKind::Send => SO_SNDTIMEO,
        }
    }
}

/// Per-descriptor record consulted by every hooked call.
///
/// A context is tied to the descriptor number it was built for.  When that
/// number is closed and later reused, the registry builds a fresh context
/// rather than recycling this one.
#[derive(Debug)]
pub struct FdCtx {
    fd: i32,
    is_init: bool,
    is_socket: bool,
    sys_nonblock: bool,
    user_nonblock: AtomicBool,
    closed: AtomicBool,
    recv_timeout: AtomicI64,
    send_timeout: AtomicI64,
}

impl FdCtx {
    /// Builds the context for `fd` by asking the kernel what it is.
    ///
    /// A failed `fstat` is not an error: the context is simply recorded as
    /// uninitialized and non-socket, and the hook layer passes every call on
    /// it straight through.  For sockets the kernel's `O_NONBLOCK` flag is
    /// turned on here, once; the application still sees blocking semantics
    /// until it asks otherwise.
    #[must_use]
    pub fn new(fd: i32) -> Self {
        let (is_init, is_socket) = match fstat_mode(fd) {
            Some(mode) => (true, (mode & libc::S_IFMT) == libc::S_IFSOCK),
            None => (false, false),
        };

        let sys_nonblock = if is_socket {
            force_kernel_nonblock(fd);
            true
        } else {
            false
        };

        log::debug!(
            "fdctx: new context fd={} init={} socket={}",
            fd,
            is_init,
            is_socket
        );

        FdCtx {
            fd,
            is_init,
            is_socket,
            sys_nonblock,
            user_nonblock: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            recv_timeout: AtomicI64::new(NO_TIMEOUT),
            send_timeout: AtomicI64::new(NO_TIMEOUT),
        }
    }

    /// The descriptor number this context was built for.
    #[must_use]
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// True once the kernel metadata for the descriptor could be read.
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.is_init
    }

    /// True iff the descriptor is a socket.  Fixed at construction.
    #[must_use]
    pub fn is_socket(&self) -> bool {
        self.is_socket
    }

    /// Whether the runtime put the kernel descriptor in `O_NONBLOCK` mode.
    /// Only ever true for sockets.
    #[must_use]
    pub fn is_sys_nonblock(&self) -> bool {
        self.sys_nonblock
    }

    /// Records whether the application asked for non-blocking semantics
    /// (`fcntl(F_SETFL, O_NONBLOCK)`, `ioctl(FIONBIO)`).
    pub fn set_user_nonblock(&self, v: bool) {
        self.user_nonblock.store(v, Ordering::Release);
    }

    /// Non-blocking as seen by the application.
    #[must_use]
    pub fn is_user_nonblock(&self) -> bool {
        self.user_nonblock.load(Ordering::Acquire)
    }

    /// Marks the descriptor released.  In-flight hooked calls holding this
    /// context check it after every wakeup.
    pub fn set_closed(&self, v: bool) {
        self.closed.store(v, Ordering::Release);
    }

    /// Whether the descriptor has been released through the registry.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stores the timeout (milliseconds) for one direction, leaving the
    /// other untouched.  [`NO_TIMEOUT`] clears it.
    pub fn set_timeout(&self, kind: TimeoutKind, ms: i64) {
        self.timeout_slot(kind).store(ms, Ordering::Release);
    }

    /// Returns the timeout for one direction, or [`NO_TIMEOUT`] if none
    /// was ever set.
    #[must_use]
    pub fn get_timeout(&self, kind: TimeoutKind) -> i64 {
        self.timeout_slot(kind).load(Ordering::Acquire)
    }

    fn timeout_slot(&self, kind: TimeoutKind) -> &AtomicI64 {
        match kind {
            TimeoutKind::Recv => &self.recv_timeout,
            TimeoutKind::Send => &self.send_timeout,
        }
    }
}

// Helper to isolate the unsafe fstat call.  None if the kernel refused.
fn fstat_mode(fd: i32) -> Option<libc::mode_t> {
    let mut stat = MaybeUninit::<libc::stat>::uninit();
    let ret = unsafe { libc::fstat(fd, stat.as_mut_ptr()) };
    if ret == -1 {
        return None;
    }
    // fstat succeeded, so the struct is filled in.
    let stat = unsafe { stat.assume_init() };
    Some(stat.st_mode)
}

fn force_kernel_nonblock(fd: i32) {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags == -1 {
        log::warn!(
            "fdctx: F_GETFL failed on socket fd={} (errno {})",
            fd,
            sysdefs::constants::get_errno()
        );
        return;
    }
    if flags & libc::O_NONBLOCK != 0 {
        return;
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
        log::warn!(
            "fdctx: could not set O_NONBLOCK on socket fd={} (errno {})",
            fd,
            sysdefs::constants::get_errno()
        );
    }
}
