//! The seam between the hooks and whatever scheduler drives the fibers.
//!
//! A hooked call that would block asks the reactor to park the current task
//! until its descriptor is ready, its timeout runs out, or the descriptor is
//! closed underneath it.  A fiber scheduler implements [`Reactor`] by
//! registering the fd with its event loop and yielding; [`PollReactor`] is
//! the thread-backed version, where every task is an OS thread and parking
//! is a `poll(2)`.

use dashmap::DashMap;

use std::cmp;
use std::thread;
use std::time::{Duration, Instant};

use fdctx::TimeoutKind;
use sysdefs::constants::{get_errno, Errno, POLL_SLICE_MS};

/// Which readiness a suspended call is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Readable, or a connection waiting to be accepted.
    Read,
    /// Writable, or a pending connect finished.
    Write,
}

impl Interest {
    /// The per-descriptor timeout that bounds a wait in this direction.
    #[must_use]
    pub fn timeout_kind(self) -> TimeoutKind {
        match self {
            Interest::Read => TimeoutKind::Recv,
            Interest::Write => TimeoutKind::Send,
        }
    }

    fn poll_events(self) -> libc::c_short {
        match self {
            Interest::Read => libc::POLLIN,
            Interest::Write => libc::POLLOUT,
        }
    }
}

/// How a wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// The descriptor is ready (or in an error state the retried call will
    /// report).
    Ready,
    /// The timeout elapsed first.
    TimedOut,
    /// The descriptor was closed while we were parked on it.
    Cancelled,
}

/// What the hook layer needs from a scheduler.
///
/// None of these are called with registry locks held.
pub trait Reactor: Send + Sync {
    /// Parks the calling task until `fd` is ready for `interest`.
    /// `timeout_ms < 0` waits without limit.
    fn wait_ready(&self, fd: i32, interest: Interest, timeout_ms: i64) -> WaitResult;

    /// Wakes everything parked on `fd` with [`WaitResult::Cancelled`].
    fn cancel(&self, fd: i32);

    /// Parks the calling task for `dur`.
    fn sleep(&self, dur: Duration);
}

/// Thread-backed reactor: each task is an OS thread and parking is a
/// `poll(2)` on the one descriptor.
///
/// Polls run in slices of at most `POLL_SLICE_MS` so a waiter notices a
/// [`Reactor::cancel`] within one slice.  Cancellation bumps a per-fd
/// generation counter; a waiter that sees the counter move gives up.
#[derive(Debug, Default)]
pub struct PollReactor {
    generations: DashMap<i32, u64>,
}

impl PollReactor {
    /// A reactor with no cancellations recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn generation(&self, fd: i32) -> u64 {
        self.generations.get(&fd).map_or(0, |g| *g)
    }
}

impl Reactor for PollReactor {
    fn wait_ready(&self, fd: i32, interest: Interest, timeout_ms: i64) -> WaitResult {
        let start_gen = self.generation(fd);
        let deadline = u64::try_from(timeout_ms)
            .ok()
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        loop {
            let slice = match deadline {
                None => POLL_SLICE_MS,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    // round up so we never spin on a sub-millisecond remainder
                    let left_ms = i64::try_from(left.as_micros().div_ceil(1000)).unwrap_or(i64::MAX);
                    cmp::min(left_ms, POLL_SLICE_MS)
                }
            };

            let mut pfd = libc::pollfd {
                fd,
                events: interest.poll_events(),
                revents: 0,
            };
            // slice is bounded by POLL_SLICE_MS, so the cast is lossless
            let ret = unsafe { libc::poll(&mut pfd, 1, slice as libc::c_int) };

            if self.generation(fd) != start_gen {
                return WaitResult::Cancelled;
            }
            if ret > 0 {
                return WaitResult::Ready;
            }
            if ret < 0 && get_errno() != Errno::EINTR as i32 {
                // Let the retried call surface whatever went wrong.
                log::debug!("reactor: poll on fd {} failed with errno {}", fd, get_errno());
                return WaitResult::Ready;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return WaitResult::TimedOut;
                }
            }
        }
    }

    fn cancel(&self, fd: i32) {
        *self.generations.entry(fd).or_insert(0) += 1;
    }

    fn sleep(&self, dur: Duration) {
        thread::sleep(dur);
    }
}
