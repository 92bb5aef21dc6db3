// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vblank prediction from the last observed vblank and the refresh interval.
//!
//! ```text
//!   last vblank          vblank + interval       vblank + 2 * interval
//!        |                        |                        |
//!   -----+------------------------+------------------------+-----
//!                            ^    ^                   ^
//!                          latch  |                 latch
//!                      <red zone> |
//! ```
//!
//! The predicted vblank is the first one whose latch point, `red_zone` before
//! it, is still ahead of now. Frames arriving inside the red zone would race
//! the flip, so they are pushed to the next refresh.

use latchpace_core::backend::{Clock, VBlankPredictor};
use latchpace_core::schedule::VBlankSchedule;
use latchpace_core::time::{Duration, HostTime};
use parking_lot::Mutex;

/// Configuration for [`RefreshPredictor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredictorConfig {
    /// Time between vblanks.
    pub refresh_interval: Duration,
    /// How long before a vblank its contents are latched.
    pub red_zone: Duration,
}

impl PredictorConfig {
    /// 60 Hz with a 1.65 ms red zone.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            refresh_interval: Duration(16_666_667),
            red_zone: Duration(1_650_000),
        }
    }

    /// Returns a copy for the given refresh rate in millihertz.
    #[must_use]
    pub const fn with_refresh_mhz(mut self, millihertz: u64) -> Self {
        if let Some(interval) = 1_000_000_000_000_u64.checked_div(millihertz) {
            self.refresh_interval = Duration(interval);
        }
        self
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug)]
struct Observed {
    last_vblank: HostTime,
    refresh_interval: Duration,
}

/// [`VBlankPredictor`] that extrapolates from the last observed vblank.
///
/// Peeking never changes the prediction state; only
/// [`observe_vblank`](Self::observe_vblank) and
/// [`set_refresh_interval`](Self::set_refresh_interval) do.
#[derive(Debug)]
pub struct RefreshPredictor<C> {
    clock: C,
    red_zone: Duration,
    observed: Mutex<Observed>,
}

impl<C: Clock> RefreshPredictor<C> {
    /// Creates a predictor anchored at the clock's current time.
    #[must_use]
    pub fn new(clock: C, config: PredictorConfig) -> Self {
        let last_vblank = clock.now();
        Self {
            clock,
            red_zone: config.red_zone,
            observed: Mutex::new(Observed {
                last_vblank,
                refresh_interval: config.refresh_interval,
            }),
        }
    }

    /// Records an actual vblank, re-anchoring predictions on it.
    pub fn observe_vblank(&self, at: HostTime) {
        self.observed.lock().last_vblank = at;
    }

    /// Updates the refresh interval after a mode change. Zero is ignored.
    pub fn set_refresh_interval(&self, interval: Duration) {
        if interval.nanos() != 0 {
            self.observed.lock().refresh_interval = interval;
        }
    }

    /// The last observed vblank.
    #[must_use]
    pub fn last_vblank(&self) -> HostTime {
        self.observed.lock().last_vblank
    }

    /// The current refresh interval.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.observed.lock().refresh_interval
    }
}

impl<C: Clock> VBlankPredictor for RefreshPredictor<C> {
    fn peek_next_wakeup(&self) -> VBlankSchedule {
        let observed = *self.observed.lock();
        predict(
            observed.last_vblank,
            observed.refresh_interval,
            self.red_zone,
            self.clock.now(),
        )
    }
}

/// Returns the first vblank after `last_vblank` whose latch point is after
/// `now`.
#[must_use]
pub fn predict(
    last_vblank: HostTime,
    refresh_interval: Duration,
    red_zone: Duration,
    now: HostTime,
) -> VBlankSchedule {
    let interval = refresh_interval.nanos().max(1);
    let earliest = now.nanos().saturating_add(red_zone.nanos());

    let mut vblank = last_vblank.nanos().saturating_add(interval);
    if vblank <= earliest {
        let skipped = (earliest - vblank) / interval + 1;
        vblank = vblank.saturating_add(skipped.saturating_mul(interval));
    }

    let target_vblank = HostTime(vblank);
    VBlankSchedule {
        target_vblank,
        latch_deadline: target_vblank.saturating_sub(red_zone),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    const MS: u64 = 1_000_000;

    #[derive(Debug, Default)]
    struct FixedClock(AtomicU64);

    impl Clock for FixedClock {
        fn now(&self) -> HostTime {
            HostTime(self.0.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn next_vblank_when_latch_is_ahead() {
        let s = predict(
            HostTime(0),
            Duration(16 * MS),
            Duration(2 * MS),
            HostTime(5 * MS),
        );
        assert_eq!(s.target_vblank, HostTime(16 * MS));
        assert_eq!(s.latch_deadline, HostTime(14 * MS));
    }

    #[test]
    fn skips_vblank_inside_the_red_zone() {
        let s = predict(
            HostTime(0),
            Duration(16 * MS),
            Duration(2 * MS),
            HostTime(15 * MS),
        );
        assert_eq!(s.target_vblank, HostTime(32 * MS));
        assert_eq!(s.latch_deadline, HostTime(30 * MS));
    }

    #[test]
    fn latch_exactly_now_is_already_missed() {
        let s = predict(
            HostTime(0),
            Duration(16 * MS),
            Duration(2 * MS),
            HostTime(14 * MS),
        );
        assert_eq!(s.target_vblank, HostTime(32 * MS));
    }

    #[test]
    fn catches_up_after_missed_observations() {
        let s = predict(
            HostTime(0),
            Duration(10 * MS),
            Duration(MS),
            HostTime(95 * MS),
        );
        assert_eq!(s.target_vblank, HostTime(100 * MS));
        assert!(s.latch_deadline > HostTime(95 * MS), "latch must be ahead");
    }

    #[test]
    fn zero_interval_does_not_divide_by_zero() {
        let s = predict(HostTime(10), Duration(0), Duration(0), HostTime(20));
        assert_eq!(s.target_vblank, HostTime(21));
    }

    #[test]
    fn peeking_does_not_advance() {
        let clock = Arc::new(FixedClock::default());
        clock.0.store(3 * MS, Ordering::SeqCst);
        let predictor = RefreshPredictor::new(Arc::clone(&clock), PredictorConfig::new());
        let first = predictor.peek_next_wakeup();
        let second = predictor.peek_next_wakeup();
        assert_eq!(first, second);
        assert_eq!(first.target_vblank, HostTime(3 * MS + 16_666_667));
        assert_eq!(predictor.last_vblank(), HostTime(3 * MS));
    }

    #[test]
    fn observations_and_mode_changes_feed_predictions() {
        let clock = Arc::new(FixedClock::default());
        let predictor = RefreshPredictor::new(
            Arc::clone(&clock),
            PredictorConfig::new().with_refresh_mhz(120_000),
        );
        assert_eq!(predictor.refresh_interval(), Duration(8_333_333));

        clock.0.store(20 * MS, Ordering::SeqCst);
        predictor.observe_vblank(HostTime(18 * MS));
        predictor.set_refresh_interval(Duration(10 * MS));
        predictor.set_refresh_interval(Duration(0));
        assert_eq!(
            predictor.peek_next_wakeup().target_vblank,
            HostTime(28 * MS)
        );
    }
}
