// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host clock reads.

use latchpace_core::backend::Clock;
use latchpace_core::time::HostTime;
use rustix::time::{ClockId, Timespec, clock_gettime};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// [`Clock`] backed by `CLOCK_MONOTONIC`.
///
/// This is the clock `timerfd` deadlines are programmed against, so wakeups
/// computed from it land where they were planned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> HostTime {
        now()
    }
}

/// Returns the current monotonic host time in nanoseconds.
#[must_use]
pub fn now() -> HostTime {
    timespec_to_host_time(clock_gettime(ClockId::Monotonic))
}

pub(crate) fn timespec_to_host_time(timespec: Timespec) -> HostTime {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(NANOS_PER_SECOND - 1);

    let total = u128::from(seconds)
        .saturating_mul(u128::from(NANOS_PER_SECOND))
        .saturating_add(u128::from(nanos));
    HostTime(u64::try_from(total).unwrap_or(u64::MAX))
}

pub(crate) fn host_time_to_timespec(t: HostTime) -> Timespec {
    let nanos = t.nanos();
    Timespec {
        tv_sec: i64::try_from(nanos / NANOS_PER_SECOND).unwrap_or(i64::MAX),
        tv_nsec: i64::try_from(nanos % NANOS_PER_SECOND).unwrap_or(0),
    }
}
