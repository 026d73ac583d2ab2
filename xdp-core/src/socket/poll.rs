//! Blocks on socket readability with a bounded timeout, used by the
//! service's worker loop as its sole blocking suspension point besides
//! the non-blocking wake-up send.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

#[derive(Debug)]
pub struct PollError(pub io::Error);

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "poll failed: {}", self.0)
    }
}

impl std::error::Error for PollError {}

/// Waits up to `timeout` for `fd` to become readable. Returns `Ok(true)`
/// if it became readable, `Ok(false)` on timeout.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool, PollError> {
    let mut fds = [libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }];
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let ret = unsafe { libc::poll(fds.as_mut_ptr(), 1, timeout_ms) };
    if ret < 0 {
        return Err(PollError(io::Error::last_os_error()));
    }
    Ok(ret > 0 && fds[0].revents & libc::POLLIN != 0)
}
