// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A dedicated thread that delivers timer expiries to the limiter.

use std::io;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use latchpace_core::limiter::FrameLimiter;
use latchpace_core::timestamp::PacedBuffer;
use rustix::event::{EventfdFlags, PollFd, PollFlags, eventfd, poll};
use rustix::io::Errno;

use crate::timer::TimerFd;

/// Default name of the release thread.
pub const THREAD_NAME: &str = "latchpace-release";

/// Owns the thread waiting on a [`TimerFd`].
///
/// Every expiry invokes the callback once, no matter how many expirations
/// accumulated. [`stop`](Self::stop) (or dropping) wakes the thread through
/// an eventfd and joins it.
#[derive(Debug)]
pub struct TimerThread {
    wake: Arc<OwnedFd>,
    fires: Arc<AtomicU64>,
    thread: Option<JoinHandle<io::Result<()>>>,
}

impl TimerThread {
    /// Spawns a named thread calling `on_fire` on every expiry of `timer`.
    pub fn spawn<F>(name: &str, timer: Arc<TimerFd>, mut on_fire: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let wake = Arc::new(eventfd(0, EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK)?);
        let fires = Arc::new(AtomicU64::new(0));

        let thread = {
            let wake = Arc::clone(&wake);
            let fires = Arc::clone(&fires);
            thread::Builder::new()
                .name(name.to_owned())
                .spawn(move || {
                    run(&timer, &wake, || {
                        fires.fetch_add(1, Ordering::Relaxed);
                        on_fire();
                    })
                })?
        };

        Ok(Self {
            wake,
            fires,
            thread: Some(thread),
        })
    }

    /// Spawns the release thread for `limiter`.
    ///
    /// `timer` must be the same timer the limiter programs.
    pub fn for_limiter<B>(limiter: Arc<FrameLimiter<B>>, timer: Arc<TimerFd>) -> io::Result<Self>
    where
        B: PacedBuffer + 'static,
    {
        Self::spawn(THREAD_NAME, timer, move || {
            let _ = limiter.on_timer_fire();
        })
    }

    /// Number of expiries delivered so far.
    #[must_use]
    pub fn fires(&self) -> u64 {
        self.fires.load(Ordering::Relaxed)
    }

    /// Wakes and joins the thread. Returns the thread's exit status; later
    /// calls return `Ok(())`.
    pub fn stop(&mut self) -> io::Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        rustix::io::write(&*self.wake, &1_u64.to_ne_bytes())?;
        thread
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("release thread panicked")))
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn run(timer: &TimerFd, wake: &OwnedFd, mut on_fire: impl FnMut()) -> io::Result<()> {
    loop {
        let mut fds = [
            PollFd::new(timer, PollFlags::IN),
            PollFd::new(wake, PollFlags::IN),
        ];
        match poll(&mut fds, None) {
            Ok(_) => {}
            Err(Errno::INTR) => continue,
            Err(err) => return Err(err.into()),
        }
        if !fds[1].revents().is_empty() {
            return Ok(());
        }
        let ready = fds[0].revents().contains(PollFlags::IN);
        if ready && timer.drain()? > 0 {
            on_fire();
        }
    }
}
