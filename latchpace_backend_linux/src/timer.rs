// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot release timer on top of `timerfd`.

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicU64, Ordering};

use latchpace_core::backend::ReleaseTimer;
use latchpace_core::time::HostTime;
use rustix::event::{PollFd, PollFlags, poll};
use rustix::io::Errno;
use rustix::time::{
    Itimerspec, TimerfdClockId, TimerfdFlags, TimerfdTimerFlags, Timespec, timerfd_create,
    timerfd_settime,
};

use crate::time::host_time_to_timespec;

const DISARMED: Timespec = Timespec {
    tv_sec: 0,
    tv_nsec: 0,
};

/// A non-blocking `CLOCK_MONOTONIC` timerfd programmed with absolute
/// one-shot deadlines.
///
/// Expiry is observed by polling the descriptor, either through
/// [`wait`](Self::wait) or by registering [`as_fd`](AsFd::as_fd) in an
/// existing event loop and calling [`drain`](Self::drain) when it becomes
/// readable.
#[derive(Debug)]
pub struct TimerFd {
    fd: OwnedFd,
    arm_failures: AtomicU64,
}

impl TimerFd {
    /// Creates a disarmed timer.
    pub fn new() -> io::Result<Self> {
        let fd = timerfd_create(
            TimerfdClockId::Monotonic,
            TimerfdFlags::CLOEXEC | TimerfdFlags::NONBLOCK,
        )?;
        Ok(Self {
            fd,
            arm_failures: AtomicU64::new(0),
        })
    }

    /// Programs an absolute deadline, replacing any pending one.
    pub fn set_deadline(&self, deadline: HostTime) -> io::Result<()> {
        // An all-zero it_value disarms, so the earliest expressible deadline
        // is 1ns. It is in the past and fires immediately.
        let deadline = HostTime(deadline.nanos().max(1));
        self.settime(host_time_to_timespec(deadline), TimerfdTimerFlags::ABSTIME)
    }

    /// Cancels any pending deadline.
    pub fn clear(&self) -> io::Result<()> {
        self.settime(DISARMED, TimerfdTimerFlags::empty())
    }

    fn settime(&self, value: Timespec, flags: TimerfdTimerFlags) -> io::Result<()> {
        let spec = Itimerspec {
            it_interval: DISARMED,
            it_value: value,
        };
        timerfd_settime(&self.fd, flags, &spec)?;
        Ok(())
    }

    /// Reads and resets the expiration count. Returns 0 if the timer has
    /// not expired since the last drain.
    pub fn drain(&self) -> io::Result<u64> {
        let mut buf = [0_u8; 8];
        loop {
            match rustix::io::read(&self.fd, &mut buf[..]) {
                Ok(8) => return Ok(u64::from_ne_bytes(buf)),
                Ok(_) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Err(Errno::AGAIN) => return Ok(0),
                Err(Errno::INTR) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Blocks until the timer expires or `timeout` elapses, then drains it.
    ///
    /// Returns the expiration count, 0 on timeout. `None` waits forever.
    pub fn wait(&self, timeout: Option<std::time::Duration>) -> io::Result<u64> {
        let timeout = timeout.map(duration_to_timespec);
        let mut fds = [PollFd::new(&self.fd, PollFlags::IN)];
        loop {
            match poll(&mut fds, timeout.as_ref()) {
                Ok(0) => return Ok(0),
                Ok(_) => return self.drain(),
                Err(Errno::INTR) => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// How many times programming the timer failed. The
    /// [`ReleaseTimer`] methods cannot report errors, so they count them.
    #[must_use]
    pub fn arm_failures(&self) -> u64 {
        self.arm_failures.load(Ordering::Relaxed)
    }
}

impl AsFd for TimerFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl ReleaseTimer for TimerFd {
    fn arm(&self, deadline: HostTime) {
        if self.set_deadline(deadline).is_err() {
            self.arm_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn disarm(&self) {
        if self.clear().is_err() {
            self.arm_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn duration_to_timespec(d: std::time::Duration) -> Timespec {
    Timespec {
        tv_sec: i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        tv_nsec: i64::from(d.subsec_nanos()),
    }
}
