// Sleep tests
//
// With hooks on, sleeps are handed to the reactor; a ScriptedReactor lets us
// check the durations without waiting for them.

use std::time::{Duration, Instant};

use sysdefs::constants::Errno;

use crate::config::set_hook_enable;
use crate::tests::*;

#[test]
fn test_sleeps_go_through_reactor() {
    let (_guard, _) = test_setup();
    let reactor = ScriptedReactor::answering(&[]);
    let hooks = scripted_hooks(&reactor);

    assert_eq!(hooks.sleep(2), 0);
    assert_eq!(hooks.usleep(1_500), 0);
    let req = libc::timespec {
        tv_sec: 1,
        tv_nsec: 5,
    };
    assert_eq!(hooks.nanosleep(&req, None), 0);

    assert_eq!(
        *reactor.sleeps.lock(),
        vec![
            Duration::from_secs(2),
            Duration::from_micros(1_500),
            Duration::new(1, 5)
        ]
    );

    test_teardown();
}

/// Test: nanosleep rejects a malformed timespec without sleeping
#[test]
fn test_nanosleep_invalid() {
    let (_guard, _) = test_setup();
    let reactor = ScriptedReactor::answering(&[]);
    let hooks = scripted_hooks(&reactor);

    let negative = libc::timespec {
        tv_sec: -1,
        tv_nsec: 0,
    };
    let too_many_nanos = libc::timespec {
        tv_sec: 0,
        tv_nsec: 1_000_000_000,
    };
    assert_eq!(hooks.nanosleep(&negative, None), -(Errno::EINVAL as i32));
    assert_eq!(hooks.nanosleep(&too_many_nanos, None), -(Errno::EINVAL as i32));
    assert!(reactor.sleeps.lock().is_empty());

    test_teardown();
}

#[test]
fn test_nanosleep_zeroes_remainder() {
    let (_guard, _) = test_setup();
    let reactor = ScriptedReactor::answering(&[]);
    let hooks = scripted_hooks(&reactor);

    let req = libc::timespec {
        tv_sec: 0,
        tv_nsec: 1_000,
    };
    let mut rem = libc::timespec {
        tv_sec: 9,
        tv_nsec: 9,
    };
    assert_eq!(hooks.nanosleep(&req, Some(&mut rem)), 0);
    assert_eq!((rem.tv_sec, rem.tv_nsec), (0, 0));

    test_teardown();
}

/// Test: with hooks off the kernel does the sleeping
#[test]
fn test_sleep_hooks_off() {
    let (_guard, _) = test_setup();
    set_hook_enable(false);
    let reactor = ScriptedReactor::answering(&[]);
    let hooks = scripted_hooks(&reactor);

    let start = Instant::now();
    assert_eq!(hooks.usleep(20_000), 0);
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert!(reactor.sleeps.lock().is_empty());

    test_teardown();
}

/// Test: the PollReactor really sleeps
#[test]
fn test_poll_reactor_sleep() {
    let (_guard, hooks) = test_setup();

    let start = Instant::now();
    assert_eq!(hooks.usleep(30_000), 0);
    assert!(start.elapsed() >= Duration::from_millis(30));

    test_teardown();
}
