// Hook test suite
//
// These tests drive the hooks with real descriptors: unix socket pairs for
// stream behavior, loopback TCP / UDP for the address-taking calls and
// tempfiles for descriptors that are not sockets.  Waits go through a
// PollReactor unless a test needs to see exactly what the hooks asked the
// reactor for, in which case it uses a ScriptedReactor.

mod fs_tests; // close, fcntl, ioctl
mod sys_tests; // sleep, usleep, nanosleep

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::config::{set_hook_enable, HookConfig};
use crate::init::Hooks;
use crate::reactor::{Interest, Reactor, WaitResult};
use fdctx::FdManager;

lazy_static! {
    // Timing-sensitive tests are less flaky when they don't compete.
    static ref TEST_MUTEX: Mutex<bool> = Mutex::new(true);
}

/// Serializes the test, switches the hooks on for this thread and returns a
/// fresh `Hooks` driven by a `PollReactor`.
pub fn test_setup() -> (parking_lot::MutexGuard<'static, bool>, Hooks) {
    let guard = TEST_MUTEX.lock();
    set_hook_enable(true);
    (guard, Hooks::with_poll_reactor(HookConfig::default()))
}

/// Switches the hooks back off for this thread.
pub fn test_teardown() {
    set_hook_enable(false);
}

/// A connected `AF_UNIX` stream pair, straight from the kernel.
pub fn socket_pair() -> (i32, i32) {
    let mut fds = [-1; 2];
    let ret = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(ret, 0, "socketpair failed");
    (fds[0], fds[1])
}

pub fn raw_close(fd: i32) {
    unsafe {
        libc::close(fd);
    }
}

pub fn raw_write(fd: i32, data: &[u8]) -> isize {
    unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) }
}

pub fn kernel_flags(fd: i32) -> i32 {
    unsafe { libc::fcntl(fd, libc::F_GETFL) }
}

/// A reactor that never touches the kernel.  It records every request and
/// answers waits from a script (`Ready` once the script runs out).
#[derive(Default)]
pub struct ScriptedReactor {
    pub answers: Mutex<VecDeque<WaitResult>>,
    pub waits: Mutex<Vec<(i32, Interest, i64)>>,
    pub cancels: Mutex<Vec<i32>>,
    pub sleeps: Mutex<Vec<Duration>>,
}

impl ScriptedReactor {
    pub fn answering(answers: &[WaitResult]) -> Arc<Self> {
        Arc::new(ScriptedReactor {
            answers: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        })
    }
}

impl Reactor for ScriptedReactor {
    fn wait_ready(&self, fd: i32, interest: Interest, timeout_ms: i64) -> WaitResult {
        self.waits.lock().push((fd, interest, timeout_ms));
        self.answers.lock().pop_front().unwrap_or(WaitResult::Ready)
    }

    fn cancel(&self, fd: i32) {
        self.cancels.lock().push(fd);
    }

    fn sleep(&self, dur: Duration) {
        self.sleeps.lock().push(dur);
    }
}

/// Hooks over a fresh registry and the given scripted reactor.
pub fn scripted_hooks(reactor: &Arc<ScriptedReactor>) -> Hooks {
    Hooks::new(
        Arc::new(FdManager::new()),
        reactor.clone(),
        HookConfig::default(),
    )
}
