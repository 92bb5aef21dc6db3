// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::backend::{Clock, ReleaseTimer, VBlankPredictor};
use crate::schedule::VBlankSchedule;
use crate::time::HostTime;
use crate::timestamp::{BufferTimestamp, PacedBuffer, TimestampLock};

/// A clock that only moves when told to.
#[derive(Debug)]
pub(crate) struct ManualClock(AtomicU64);

impl ManualClock {
    pub(crate) fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub(crate) fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.0.load(Ordering::SeqCst))
    }
}

/// Returns a fixed latch deadline, with the vblank 1ms after it, and counts
/// peeks.
#[derive(Debug)]
pub(crate) struct ScriptedPredictor {
    latch: AtomicU64,
    peeks: AtomicUsize,
}

impl ScriptedPredictor {
    pub(crate) fn new(latch: u64) -> Self {
        Self {
            latch: AtomicU64::new(latch),
            peeks: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_latch(&self, latch: u64) {
        self.latch.store(latch, Ordering::SeqCst);
    }

    pub(crate) fn peeks(&self) -> usize {
        self.peeks.load(Ordering::SeqCst)
    }
}

impl VBlankPredictor for ScriptedPredictor {
    fn peek_next_wakeup(&self) -> VBlankSchedule {
        self.peeks.fetch_add(1, Ordering::SeqCst);
        let latch = self.latch.load(Ordering::SeqCst);
        VBlankSchedule {
            target_vblank: HostTime(latch + 1_000_000),
            latch_deadline: HostTime(latch),
        }
    }
}

/// Vblanks every `interval` from zero, latched `red_zone` before each.
///
/// Peeks return the first vblank whose latch is still ahead of the clock.
#[derive(Debug)]
pub(crate) struct GridPredictor {
    clock: Arc<ManualClock>,
    interval: u64,
    red_zone: u64,
}

impl GridPredictor {
    pub(crate) fn new(clock: Arc<ManualClock>, interval: u64, red_zone: u64) -> Self {
        Self {
            clock,
            interval,
            red_zone,
        }
    }
}

impl VBlankPredictor for GridPredictor {
    fn peek_next_wakeup(&self) -> VBlankSchedule {
        let earliest = self.clock.now().nanos() + self.red_zone;
        let vblank = (earliest / self.interval + 1) * self.interval;
        VBlankSchedule {
            target_vblank: HostTime(vblank),
            latch_deadline: HostTime(vblank - self.red_zone),
        }
    }
}

/// Records every programmed deadline in call order.
#[derive(Debug, Default)]
pub(crate) struct RecordingTimer {
    deadlines: Mutex<Vec<HostTime>>,
    disarms: AtomicUsize,
}

impl RecordingTimer {
    pub(crate) fn deadlines(&self) -> Vec<HostTime> {
        self.deadlines.lock().clone()
    }

    pub(crate) fn last_deadline(&self) -> Option<HostTime> {
        self.deadlines.lock().last().copied()
    }

    pub(crate) fn disarms(&self) -> usize {
        self.disarms.load(Ordering::SeqCst)
    }
}

impl ReleaseTimer for RecordingTimer {
    fn arm(&self, deadline: HostTime) {
        self.deadlines.lock().push(deadline);
    }

    fn disarm(&self) {
        self.disarms.fetch_add(1, Ordering::SeqCst);
    }
}

/// A buffer with an identity.
#[derive(Debug)]
pub(crate) struct TestBuffer {
    pub(crate) id: usize,
    timestamp: TimestampLock,
}

impl TestBuffer {
    pub(crate) fn new(id: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            timestamp: TimestampLock::new(),
        })
    }

    pub(crate) fn timestamp_snapshot(&self) -> BufferTimestamp {
        self.timestamp.snapshot()
    }
}

impl PacedBuffer for TestBuffer {
    fn timestamp(&self) -> &TimestampLock {
        &self.timestamp
    }
}
