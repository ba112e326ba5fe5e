//! Hooked sleeps.  With hooks on they park through the reactor instead of
//! blocking the scheduler thread.

use std::time::Duration;

use sysdefs::constants::{get_errno, handle_errno, syscall_error, Errno};

use crate::config::is_hook_enable;
use crate::init::Hooks;

impl Hooks {
    /// Reference to Linux: https://man7.org/linux/man-pages/man3/sleep.3.html
    ///
    /// Returns the number of seconds left unslept, which is always 0 when
    /// parked through the reactor.
    pub fn sleep(&self, secs: u32) -> u32 {
        if !is_hook_enable() {
            return unsafe { libc::sleep(secs) };
        }
        self.reactor.sleep(Duration::from_secs(u64::from(secs)));
        0
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man3/usleep.3.html
    pub fn usleep(&self, usecs: u32) -> i32 {
        if !is_hook_enable() {
            let ret = unsafe { libc::usleep(usecs) };
            if ret < 0 {
                return handle_errno(get_errno(), "usleep");
            }
            return ret;
        }
        self.reactor.sleep(Duration::from_micros(u64::from(usecs)));
        0
    }

    /// Reference to Linux: https://man7.org/linux/man-pages/man2/nanosleep.2.html
    ///
    /// A parked sleep is never interrupted, so `rem` (if given) is zeroed.
    pub fn nanosleep(&self, req: &libc::timespec, rem: Option<&mut libc::timespec>) -> i32 {
        if !is_hook_enable() {
            let rem_ptr = rem.map_or(std::ptr::null_mut(), |r| r as *mut libc::timespec);
            let ret = unsafe { libc::nanosleep(req, rem_ptr) };
            if ret < 0 {
                return handle_errno(get_errno(), "nanosleep");
            }
            return ret;
        }

        let (Ok(secs), Ok(nanos)) = (u64::try_from(req.tv_sec), u32::try_from(req.tv_nsec)) else {
            return syscall_error(Errno::EINVAL, "nanosleep", "negative timespec");
        };
        if nanos >= 1_000_000_000 {
            return syscall_error(Errno::EINVAL, "nanosleep", "tv_nsec out of range");
        }

        self.reactor.sleep(Duration::new(secs, nanos));
        if let Some(rem) = rem {
            rem.tv_sec = 0;
            rem.tv_nsec = 0;
        }
        0
    }
}
