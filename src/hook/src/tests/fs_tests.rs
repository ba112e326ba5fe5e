// Descriptor-control tests: close, fcntl, ioctl(FIONBIO)

use std::os::unix::io::AsRawFd;

use sysdefs::constants::{Errno, F_GETFL, F_SETFL, O_NONBLOCK};

use crate::config::set_hook_enable;
use crate::tests::*;

/// Test: F_GETFL reports the application's view; the kernel keeps
/// O_NONBLOCK on a socket.
#[test]
fn test_fcntl_reports_user_view() {
    let (_guard, hooks) = test_setup();
    let (a, b) = socket_pair();

    let flags = hooks.fcntl(a, F_GETFL, 0);
    assert!(flags >= 0);
    assert_eq!(flags & O_NONBLOCK, 0);
    assert_ne!(kernel_flags(a) & O_NONBLOCK, 0);

    assert_eq!(hooks.fcntl(a, F_SETFL, flags | O_NONBLOCK), 0);
    let ctx = hooks.fd_manager().get(a, false).unwrap();
    assert!(ctx.is_user_nonblock());
    assert_ne!(hooks.fcntl(a, F_GETFL, 0) & O_NONBLOCK, 0);

    // going back to blocking leaves the kernel flag alone
    assert_eq!(hooks.fcntl(a, F_SETFL, flags & !O_NONBLOCK), 0);
    assert!(!ctx.is_user_nonblock());
    assert_eq!(hooks.fcntl(a, F_GETFL, 0) & O_NONBLOCK, 0);
    assert_ne!(kernel_flags(a) & O_NONBLOCK, 0);

    raw_close(a);
    raw_close(b);
    test_teardown();
}

#[test]
fn test_ioctl_fionbio_records_intent() {
    let (_guard, hooks) = test_setup();
    let (a, b) = socket_pair();

    assert_eq!(hooks.ioctl_fionbio(a, true), 0);
    let ctx = hooks.fd_manager().get(a, false).unwrap();
    assert!(ctx.is_user_nonblock());

    assert_eq!(hooks.ioctl_fionbio(a, false), 0);
    assert!(!ctx.is_user_nonblock());
    assert_ne!(kernel_flags(a) & O_NONBLOCK, 0);

    raw_close(a);
    raw_close(b);
    test_teardown();
}

#[test]
fn test_fcntl_regular_file_passes_through() {
    let (_guard, hooks) = test_setup();
    let file = tempfile::tempfile().unwrap();
    let fd = file.as_raw_fd();

    assert_eq!(hooks.fcntl(fd, F_SETFL, O_NONBLOCK), 0);
    assert_ne!(hooks.fcntl(fd, F_GETFL, 0) & O_NONBLOCK, 0);
    assert!(!hooks.fd_manager().get(fd, false).unwrap().is_user_nonblock());

    // commands other than F_GETFL / F_SETFL go straight through
    assert!(hooks.fcntl(fd, libc::F_GETFD, 0) >= 0);
    assert_eq!(hooks.fcntl(-1, libc::F_GETFD, 0), -(Errno::EBADF as i32));

    test_teardown();
}

/// Test: close marks outstanding handles closed, cancels waiters and
/// empties the slot.
#[test]
fn test_close_cleans_registry() {
    let (_guard, _) = test_setup();
    let (a, b) = socket_pair();

    let reactor = ScriptedReactor::answering(&[]);
    let hooks = scripted_hooks(&reactor);
    let handle = hooks.fd_manager().get(a, true).unwrap();

    assert_eq!(hooks.close(a), 0);
    assert!(handle.is_closed());
    assert!(hooks.fd_manager().get(a, false).is_none());
    assert_eq!(*reactor.cancels.lock(), vec![a]);

    // closing again is a kernel error, and there is nothing left to cancel
    assert_eq!(hooks.close(a), -(Errno::EBADF as i32));
    assert_eq!(reactor.cancels.lock().len(), 1);

    raw_close(b);
    test_teardown();
}

/// Test: the registry is cleaned up even by a thread with hooks off, so a
/// reused descriptor number starts from a fresh context.
#[test]
fn test_close_with_hooks_off() {
    let (_guard, hooks) = test_setup();
    let (a, b) = socket_pair();

    let old = hooks.fd_manager().get(a, true).unwrap();
    old.set_user_nonblock(true);

    set_hook_enable(false);
    assert_eq!(hooks.close(a), 0);
    assert!(old.is_closed());
    assert!(hooks.fd_manager().get(a, false).is_none());

    set_hook_enable(true);
    let (c, d) = socket_pair();
    let fresh = hooks.fd_manager().get(c, true).unwrap();
    assert!(!fresh.is_closed());
    assert!(!fresh.is_user_nonblock());

    raw_close(b);
    raw_close(c);
    raw_close(d);
    test_teardown();
}
