//! Hooked socket calls.
//!
//! Every call here returns what the kernel would on success and the
//! negated errno on failure.  Whether a call suspends depends on the
//! descriptor's context:
//!
//! - hooks off on this thread, no context, not a socket, or the
//!   application asked for non-blocking mode: straight to the kernel;
//! - otherwise the non-blocking kernel call is retried after parking on
//!   the reactor whenever it would block, bounded by the context's timeout
//!   for that direction.  Running out of time is `-ETIMEDOUT`, which is
//!   distinct from end-of-stream (`0`) and from `-ECONNRESET`.

use std::io::{IoSlice, IoSliceMut};
use std::mem;
use std::net::SocketAddr;
use std::time::Duration;

use fdctx::{TimeoutKind, NO_TIMEOUT};
use sysdefs::constants::{
    get_errno, handle_errno, syscall_error, Errno, SOL_SOCKET, SO_ERROR,
};

use crate::config::is_hook_enable;
use crate::init::Hooks;
use crate::net_helpers::{sockaddr_from_std, sockaddr_to_std};
use crate::reactor::{Interest, WaitResult};

/// Converts a raw kernel return into the hooked-call convention.
pub(crate) fn kernel_ret(ret: isize, syscall: &str) -> isize {
    if ret < 0 {
        handle_errno(get_errno(), syscall) as isize
    } else {
        ret
    }
}

impl Hooks {
    /// The core retry loop shared by all data-transfer calls.
    ///
    /// `raw` performs the un-hooked kernel call and returns its raw result
    /// (`-1` with errno set on failure).
    pub(crate) fn do_io<F>(&self, fd: i32, syscall: &str, interest: Interest, mut raw: F) -> isize
    where
        F: FnMut() -> isize,
    {
        if !is_hook_enable() {
            return kernel_ret(raw(), syscall);
        }

        let Some(ctx) = self.fdm.get(fd, true) else {
            return kernel_ret(raw(), syscall);
        };
        if ctx.is_closed() {
            return syscall_error(Errno::EBADF, syscall, "descriptor already closed") as isize;
        }
        if !ctx.is_init() || !ctx.is_socket() || ctx.is_user_nonblock() {
            return kernel_ret(raw(), syscall);
        }

        let timeout = ctx.get_timeout(interest.timeout_kind());

        loop {
            let mut ret = raw();
            while ret == -1 && get_errno() == Errno::EINTR as i32 {
                ret = raw();
            }
            if ret != -1 {
                return ret;
            }

            let errno = get_errno();
            if errno != Errno::EAGAIN as i32 {
                return handle_errno(errno, syscall) as isize;
            }

            match self.reactor.wait_ready(fd, interest, timeout) {
                WaitResult::Ready => {
                    if ctx.is_closed() {
                        return syscall_error(Errno::EBADF, syscall, "closed while waiting") as isize;
                    }
                }
                WaitResult::TimedOut => {
                    return syscall_error(Errno::ETIMEDOUT, syscall, "timed out waiting for fd")
                        as isize;
                }
                WaitResult::Cancelled => {
                    return syscall_error(Errno::EBADF, syscall, "closed while waiting") as isize;
                }
            }
        }
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/socket.2.html
    ///
    /// Creates the socket and registers its context right away, so the
    /// kernel descriptor is non-blocking from the start.
    pub fn socket(&self, domain: i32, socktype: i32, protocol: i32) -> i32 {
        let fd = unsafe { libc::socket(domain, socktype, protocol) };
        if fd < 0 {
            return handle_errno(get_errno(), "socket");
        }
        if is_hook_enable() {
            let _ = self.fdm.get(fd, true);
        }
        fd
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/connect.2.html
    ///
    /// Bounded by the socket's send timeout (`SO_SNDTIMEO`) when one is
    /// set, as the kernel does, and by the connect timeout from
    /// [`crate::HookConfig`] otherwise.
    pub fn connect(&self, fd: i32, addr: &SocketAddr) -> i32 {
        let send_timeout = if is_hook_enable() {
            self.fdm
                .get(fd, true)
                .map_or(NO_TIMEOUT, |ctx| ctx.get_timeout(TimeoutKind::Send))
        } else {
            NO_TIMEOUT
        };
        let timeout_ms = if send_timeout == NO_TIMEOUT {
            self.config.connect_timeout_ms
        } else {
            send_timeout
        };
        self.connect_with_timeout(fd, addr, timeout_ms)
    }

    /// `connect` bounded by `timeout_ms` (negative: no limit).
    ///
    /// A non-blocking connect reports `EINPROGRESS`; we park until the
    /// socket is writable and then read the outcome from `SO_ERROR`.
    pub fn connect_with_timeout(&self, fd: i32, addr: &SocketAddr, timeout_ms: i64) -> i32 {
        let (storage, len) = sockaddr_from_std(addr);
        let raw = || unsafe {
            libc::connect(
                fd,
                (&storage as *const libc::sockaddr_storage).cast::<libc::sockaddr>(),
                len,
            )
        };

        if !is_hook_enable() {
            return kernel_ret(raw() as isize, "connect") as i32;
        }
        let Some(ctx) = self.fdm.get(fd, true) else {
            return kernel_ret(raw() as isize, "connect") as i32;
        };
        if ctx.is_closed() {
            return syscall_error(Errno::EBADF, "connect", "descriptor already closed");
        }
        if !ctx.is_init() || !ctx.is_socket() || ctx.is_user_nonblock() {
            return kernel_ret(raw() as isize, "connect") as i32;
        }

        if raw() == 0 {
            return 0;
        }
        let errno = get_errno();
        if errno != Errno::EINPROGRESS as i32 {
            return handle_errno(errno, "connect");
        }

        match self.reactor.wait_ready(fd, Interest::Write, timeout_ms) {
            WaitResult::Ready => {}
            WaitResult::TimedOut => {
                return syscall_error(Errno::ETIMEDOUT, "connect", "connect timed out");
            }
            WaitResult::Cancelled => {
                return syscall_error(Errno::EBADF, "connect", "closed while connecting");
            }
        }
        if ctx.is_closed() {
            return syscall_error(Errno::EBADF, "connect", "closed while connecting");
        }

        let mut sockerr: libc::c_int = 0;
        let mut optlen = mem::size_of::<libc::c_int>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                fd,
                SOL_SOCKET,
                SO_ERROR,
                (&mut sockerr as *mut libc::c_int).cast::<libc::c_void>(),
                &mut optlen,
            )
        };
        if ret == -1 {
            return handle_errno(get_errno(), "connect");
        }
        if sockerr != 0 {
            return handle_errno(sockerr, "connect");
        }
        0
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/accept.2.html
    ///
    /// Waits (bounded by the listener's receive timeout) for a connection.
    /// The accepted descriptor gets its own context.  If `addr` is given and
    /// the peer is inet / inet6, it receives the peer address.
    pub fn accept(&self, fd: i32, addr: Option<&mut SocketAddr>) -> i32 {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

        let newfd = self.do_io(fd, "accept", Interest::Read, || {
            len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            unsafe {
                libc::accept(
                    fd,
                    (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr>(),
                    &mut len,
                ) as isize
            }
        }) as i32;

        if newfd < 0 {
            return newfd;
        }
        if is_hook_enable() {
            let _ = self.fdm.get(newfd, true);
        }
        if let (Some(out), Some(peer)) = (addr, sockaddr_to_std(&storage)) {
            *out = peer;
        }
        newfd
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/read.2.html
    pub fn read(&self, fd: i32, buf: &mut [u8]) -> isize {
        self.do_io(fd, "read", Interest::Read, || unsafe {
            libc::read(fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len())
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/readv.2.html
    pub fn readv(&self, fd: i32, bufs: &mut [IoSliceMut<'_>]) -> isize {
        let Ok(iovcnt) = libc::c_int::try_from(bufs.len()) else {
            return syscall_error(Errno::EINVAL, "readv", "too many buffers") as isize;
        };
        // IoSliceMut is ABI compatible with iovec on unix.
        self.do_io(fd, "readv", Interest::Read, || unsafe {
            libc::readv(fd, bufs.as_ptr().cast::<libc::iovec>(), iovcnt)
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/recv.2.html
    pub fn recv(&self, fd: i32, buf: &mut [u8], flags: i32) -> isize {
        self.do_io(fd, "recv", Interest::Read, || unsafe {
            libc::recv(fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len(), flags)
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/recvfrom.2.html
    pub fn recvfrom(
        &self,
        fd: i32,
        buf: &mut [u8],
        flags: i32,
        addr: Option<&mut SocketAddr>,
    ) -> isize {
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

        let ret = self.do_io(fd, "recvfrom", Interest::Read, || {
            len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            unsafe {
                libc::recvfrom(
                    fd,
                    buf.as_mut_ptr().cast::<libc::c_void>(),
                    buf.len(),
                    flags,
                    (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr>(),
                    &mut len,
                )
            }
        });

        if ret >= 0 {
            if let (Some(out), Some(peer)) = (addr, sockaddr_to_std(&storage)) {
                *out = peer;
            }
        }
        ret
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/write.2.html
    pub fn write(&self, fd: i32, buf: &[u8]) -> isize {
        self.do_io(fd, "write", Interest::Write, || unsafe {
            libc::write(fd, buf.as_ptr().cast::<libc::c_void>(), buf.len())
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/writev.2.html
    pub fn writev(&self, fd: i32, bufs: &[IoSlice<'_>]) -> isize {
        let Ok(iovcnt) = libc::c_int::try_from(bufs.len()) else {
            return syscall_error(Errno::EINVAL, "writev", "too many buffers") as isize;
        };
        // IoSlice is ABI compatible with iovec on unix.
        self.do_io(fd, "writev", Interest::Write, || unsafe {
            libc::writev(fd, bufs.as_ptr().cast::<libc::iovec>(), iovcnt)
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/send.2.html
    pub fn send(&self, fd: i32, buf: &[u8], flags: i32) -> isize {
        self.do_io(fd, "send", Interest::Write, || unsafe {
            libc::send(fd, buf.as_ptr().cast::<libc::c_void>(), buf.len(), flags)
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/sendto.2.html
    pub fn sendto(&self, fd: i32, buf: &[u8], flags: i32, addr: &SocketAddr) -> isize {
        let (storage, len) = sockaddr_from_std(addr);
        self.do_io(fd, "sendto", Interest::Write, || unsafe {
            libc::sendto(
                fd,
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                flags,
                (&storage as *const libc::sockaddr_storage).cast::<libc::sockaddr>(),
                len,
            )
        })
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/setsockopt.2.html
    ///
    /// Passed on to the kernel unchanged.  Once the kernel accepts a
    /// `SO_RCVTIMEO` / `SO_SNDTIMEO`, it is also recorded in the
    /// descriptor's context, since that is what bounds a hooked wait.  A
    /// zero `timeval` means "no timeout", as in the kernel.
    pub fn setsockopt(&self, fd: i32, level: i32, optname: i32, optval: &[u8]) -> i32 {
        let timeout_kind = if level == SOL_SOCKET {
            TimeoutKind::from_sockopt(optname)
        } else {
            None
        };
        if timeout_kind.is_some() && optval.len() < mem::size_of::<libc::timeval>() {
            return syscall_error(Errno::EINVAL, "setsockopt", "timeval too short");
        }

        let Ok(optlen) = libc::socklen_t::try_from(optval.len()) else {
            return syscall_error(Errno::EINVAL, "setsockopt", "option too long");
        };
        let ret = unsafe {
            libc::setsockopt(
                fd,
                level,
                optname,
                optval.as_ptr().cast::<libc::c_void>(),
                optlen,
            )
        };
        if ret < 0 {
            return handle_errno(get_errno(), "setsockopt");
        }

        if let (Some(kind), true) = (timeout_kind, is_hook_enable()) {
            let tv = unsafe { std::ptr::read_unaligned(optval.as_ptr().cast::<libc::timeval>()) };
            if let Some(ctx) = self.fdm.get(fd, true) {
                ctx.set_timeout(kind, timeval_to_ms(&tv));
            }
        }
        ret
    }

    /// Sets the receive or send timeout of `fd`; `None` clears it.  A
    /// typed front end for `setsockopt(SO_RCVTIMEO / SO_SNDTIMEO)`.
    pub fn set_socket_timeout(&self, fd: i32, kind: TimeoutKind, timeout: Option<Duration>) -> i32 {
        let tv = match timeout {
            Some(dur) => libc::timeval {
                tv_sec: libc::time_t::try_from(dur.as_secs()).unwrap_or(libc::time_t::MAX),
                tv_usec: libc::suseconds_t::from(dur.subsec_micros()),
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                (&tv as *const libc::timeval).cast::<u8>(),
                mem::size_of::<libc::timeval>(),
            )
        };
        self.setsockopt(fd, SOL_SOCKET, kind.as_sockopt(), bytes)
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/getsockopt.2.html
    ///
    /// Passed straight through.  Returns the option length on success.
    pub fn getsockopt(&self, fd: i32, level: i32, optname: i32, optval: &mut [u8]) -> i32 {
        let Ok(mut optlen) = libc::socklen_t::try_from(optval.len()) else {
            return syscall_error(Errno::EINVAL, "getsockopt", "option buffer too long");
        };
        let ret = unsafe {
            libc::getsockopt(
                fd,
                level,
                optname,
                optval.as_mut_ptr().cast::<libc::c_void>(),
                &mut optlen,
            )
        };
        if ret < 0 {
            return handle_errno(get_errno(), "getsockopt");
        }
        optlen as i32
    }
}

// Milliseconds in a timeval, rounded up so any non-zero timeout stays
// finite.  Only an all-zero timeval means "no timeout".
fn timeval_to_ms(tv: &libc::timeval) -> i64 {
    if tv.tv_sec == 0 && tv.tv_usec == 0 {
        return NO_TIMEOUT;
    }
    let usec = i64::from(tv.tv_usec);
    let ms = i64::from(tv.tv_sec)
        .saturating_mul(1000)
        .saturating_add((usec + 999) / 1000);
    ms.max(1)
}
