//! Hooked descriptor-control calls: `close`, `fcntl` and `ioctl(FIONBIO)`.
//!
//! A socket with a context always keeps O_NONBLOCK set in the kernel; what
//! the application asked for is recorded in the context instead, and
//! reported back to it by `F_GETFL`.

use sysdefs::constants::{get_errno, handle_errno, F_GETFL, F_SETFL, FIONBIO, O_NONBLOCK};

use crate::config::is_hook_enable;
use crate::init::Hooks;
use crate::net_calls::kernel_ret;

impl Hooks {
    /// Reference to Linux: https://man7.org/linux/man-pages/man2/close.2.html
    ///
    /// The registry is cleaned up even with hooks off on this thread, so a
    /// later descriptor with the same number never inherits this one's
    /// context.  Anyone parked on `fd` is woken with
    /// [`crate::WaitResult::Cancelled`].
    pub fn close(&self, fd: i32) -> i32 {
        if let Some(ctx) = self.fdm.get(fd, false) {
            ctx.set_closed(true);
            self.reactor.cancel(fd);
            self.fdm.del(fd);
        }
        let ret = unsafe { libc::close(fd) };
        kernel_ret(ret as isize, "close") as i32
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/fcntl.2.html
    ///
    /// Only `F_SETFL` and `F_GETFL` are interpreted; every other command
    /// is passed through with `arg` as an int.
    pub fn fcntl(&self, fd: i32, cmd: i32, arg: i32) -> i32 {
        match cmd {
            F_SETFL => {
                let mut flags = arg;
                if let Some(ctx) = self.fdm.get(fd, is_hook_enable()) {
                    if !ctx.is_closed() && ctx.is_socket() {
                        ctx.set_user_nonblock(arg & O_NONBLOCK != 0);
                        if ctx.is_sys_nonblock() {
                            flags |= O_NONBLOCK;
                        } else {
                            flags &= !O_NONBLOCK;
                        }
                    }
                }
                let ret = unsafe { libc::fcntl(fd, F_SETFL, flags) };
                kernel_ret(ret as isize, "fcntl") as i32
            }
            F_GETFL => {
                let ret = unsafe { libc::fcntl(fd, F_GETFL) };
                if ret < 0 {
                    return handle_errno(get_errno(), "fcntl");
                }
                match self.fdm.get(fd, is_hook_enable()) {
                    Some(ctx) if !ctx.is_closed() && ctx.is_socket() => {
                        if ctx.is_user_nonblock() {
                            ret | O_NONBLOCK
                        } else {
                            ret & !O_NONBLOCK
                        }
                    }
                    _ => ret,
                }
            }
            _ => {
                let ret = unsafe { libc::fcntl(fd, cmd, arg) };
                kernel_ret(ret as isize, "fcntl") as i32
            }
        }
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/ioctl.2.html
    ///
    /// `ioctl(fd, FIONBIO, &on)`, with the same intent recording as
    /// `fcntl(F_SETFL)`.
    pub fn ioctl_fionbio(&self, fd: i32, on: bool) -> i32 {
        let mut value: libc::c_int = libc::c_int::from(on);
        if let Some(ctx) = self.fdm.get(fd, is_hook_enable()) {
            if !ctx.is_closed() && ctx.is_socket() {
                ctx.set_user_nonblock(on);
                value = libc::c_int::from(ctx.is_sys_nonblock());
            }
        }
        let ret = unsafe { libc::ioctl(fd, FIONBIO, &mut value as *mut libc::c_int) };
        kernel_ret(ret as isize, "ioctl") as i32
    }
}
