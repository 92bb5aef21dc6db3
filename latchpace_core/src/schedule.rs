// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wakeup computation from a vblank prediction and observed render latency.
//!
//! The model is first order: the time the producer needed last cycle between
//! getting a buffer back and finishing its render (`render_delta`) is assumed
//! to hold for this cycle too. The buffer is released that long before the
//! latch deadline:
//!
//! ```text
//! desired_release = latch_deadline - render_delta
//! ```
//!
//! If that point is no longer reachable (it lies at or before
//! `now + slop`), the schedule is clamped to `now` and flagged late: release
//! immediately and try to catch up rather than aim at a point that already
//! passed.
//!
//! The predictor keeps returning the same vblank until its latch deadline
//! passes. Once a release has been made for a vblank, later schedules for it
//! wait out the latch deadline instead ([`FrameSchedule::hold_off`]), so each
//! vblank gets at most one release.

use crate::backend::{Clock, VBlankPredictor};
use crate::time::{Duration, HostTime};

/// A side-effect-free peek at the predictor's next target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VBlankSchedule {
    /// Expected time of the targeted vblank.
    pub target_vblank: HostTime,
    /// The latch point by which a frame must be done to make that vblank.
    pub latch_deadline: HostTime,
}

/// The last observed release-to-completion pair for one buffer.
///
/// Zeroed until the first buffer has made a full
/// release → render → submit trip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderTiming {
    /// When the buffer was handed back to the producer.
    pub last_release: HostTime,
    /// When rendering into that buffer completed.
    pub last_completion: HostTime,
}

impl RenderTiming {
    /// Release-to-completion latency, or zero without a valid sample.
    #[must_use]
    pub const fn render_delta(&self) -> Duration {
        self.last_completion
            .saturating_duration_since(self.last_release)
    }
}

/// A concrete release plan for one pacing cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameSchedule {
    /// The vblank this cycle aims for.
    pub target_vblank: HostTime,
    /// The latch deadline for that vblank.
    pub target_latch: HostTime,
    /// When the timer should fire to release the oldest buffer.
    pub scheduled_wakeup: HostTime,
    /// Whether the desired release point was already missed and the wakeup
    /// was clamped to "now".
    pub late: bool,
    /// Whether this vblank already got its release. The wakeup is then the
    /// latch deadline and the fire releases nothing.
    pub hold_off: bool,
}

impl FrameSchedule {
    /// A schedule that waits for the latch deadline of a vblank that was
    /// already released for.
    #[must_use]
    pub const fn hold_off(vblank: VBlankSchedule) -> Self {
        Self {
            target_vblank: vblank.target_vblank,
            target_latch: vblank.latch_deadline,
            scheduled_wakeup: vblank.latch_deadline,
            late: false,
            hold_off: true,
        }
    }
}

/// Turns vblank predictions into wakeup points.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleCalculator {
    slop: Duration,
}

impl ScheduleCalculator {
    /// Slop added to "now" before deciding a release point is still ahead,
    /// absorbing scheduler and wakeup jitter.
    pub const DEFAULT_SLOP: Duration = Duration::from_micros(500);

    /// Creates a calculator with the given slop.
    #[must_use]
    pub const fn new(slop: Duration) -> Self {
        Self { slop }
    }

    /// The slop margin in use.
    #[must_use]
    pub const fn slop(&self) -> Duration {
        self.slop
    }

    /// Peeks the predictor, reads the clock, and plans the next wakeup.
    ///
    /// The predictor is only peeked, never advanced: a pre-emptive arm must
    /// not commit to a vblank before the cycle actually moves on. If the
    /// peeked vblank is `released_for`, the result is a
    /// [`hold_off`](FrameSchedule::hold_off()) schedule.
    #[must_use]
    pub fn compute_next_wakeup(
        &self,
        predictor: &dyn VBlankPredictor,
        clock: &dyn Clock,
        timing: RenderTiming,
        released_for: Option<HostTime>,
    ) -> FrameSchedule {
        let vblank = predictor.peek_next_wakeup();
        if released_for == Some(vblank.target_vblank) {
            return FrameSchedule::hold_off(vblank);
        }
        let now = clock.now();
        self.plan(vblank, timing, now)
    }

    /// Plans the next wakeup for a known `now`.
    #[must_use]
    pub fn plan(
        &self,
        vblank: VBlankSchedule,
        timing: RenderTiming,
        now: HostTime,
    ) -> FrameSchedule {
        let desired_release = vblank.latch_deadline.saturating_sub(timing.render_delta());
        let sloppy_now = now.saturating_add(self.slop);

        let late = desired_release <= sloppy_now;
        let scheduled_wakeup = if late { now } else { desired_release };

        FrameSchedule {
            target_vblank: vblank.target_vblank,
            target_latch: vblank.latch_deadline,
            scheduled_wakeup,
            late,
            hold_off: false,
        }
    }
}

impl Default for ScheduleCalculator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLOP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ScriptedPredictor};

    fn vblank(latch: u64) -> VBlankSchedule {
        VBlankSchedule {
            target_vblank: HostTime(latch + 1_650_000),
            latch_deadline: HostTime(latch),
        }
    }

    #[test]
    fn late_release_point_clamps_to_now() {
        let calc = ScheduleCalculator::default();
        let timing = RenderTiming {
            last_release: HostTime(1_000_000),
            last_completion: HostTime(7_000_000),
        };
        assert_eq!(timing.render_delta(), Duration(6_000_000));

        // desired = 10ms - 6ms = 4ms, sloppy now = 5.5ms.
        let schedule = calc.plan(vblank(10_000_000), timing, HostTime(5_000_000));
        assert!(schedule.late);
        assert_eq!(schedule.scheduled_wakeup, HostTime(5_000_000));
        assert_eq!(schedule.target_latch, HostTime(10_000_000));
    }

    #[test]
    fn reachable_release_point_is_kept() {
        let calc = ScheduleCalculator::default();
        let timing = RenderTiming {
            last_release: HostTime(3_000_000),
            last_completion: HostTime(5_000_000),
        };

        // desired = 20ms - 2ms = 18ms, sloppy now = 1.5ms.
        let schedule = calc.plan(vblank(20_000_000), timing, HostTime(1_000_000));
        assert!(!schedule.late);
        assert_eq!(schedule.scheduled_wakeup, HostTime(18_000_000));
        assert_eq!(schedule.target_vblank, HostTime(21_650_000));
    }

    #[test]
    fn release_point_inside_slop_counts_as_late() {
        let calc = ScheduleCalculator::default();
        // desired = latch = 1.4ms, sloppy now = 1.5ms.
        let schedule = calc.plan(
            vblank(1_400_000),
            RenderTiming::default(),
            HostTime(1_000_000),
        );
        assert!(schedule.late);
        assert_eq!(schedule.scheduled_wakeup, HostTime(1_000_000));

        // Exactly on the slop boundary is still late.
        let schedule = calc.plan(
            vblank(1_500_000),
            RenderTiming::default(),
            HostTime(1_000_000),
        );
        assert!(schedule.late);
    }

    #[test]
    fn no_sample_targets_latch_directly() {
        let calc = ScheduleCalculator::default();
        let schedule = calc.plan(
            vblank(16_000_000),
            RenderTiming::default(),
            HostTime(1_000_000),
        );
        assert!(!schedule.late);
        assert_eq!(schedule.scheduled_wakeup, HostTime(16_000_000));
    }

    #[test]
    fn delta_larger_than_latch_saturates_and_clamps() {
        let calc = ScheduleCalculator::default();
        let timing = RenderTiming {
            last_release: HostTime(0),
            last_completion: HostTime(50_000_000),
        };
        let schedule = calc.plan(vblank(10_000_000), timing, HostTime(2_000_000));
        assert!(schedule.late);
        assert_eq!(schedule.scheduled_wakeup, HostTime(2_000_000));
    }

    #[test]
    fn released_vblank_waits_for_its_latch() {
        let calc = ScheduleCalculator::default();
        let clock = ManualClock::new(12_000_000);
        let predictor = ScriptedPredictor::new(14_000_000);
        let timing = RenderTiming {
            last_release: HostTime(1_000_000),
            last_completion: HostTime(5_000_000),
        };

        let fresh = calc.compute_next_wakeup(&predictor, &clock, timing, None);
        assert!(fresh.late, "desired 10ms is behind now");

        let released = Some(fresh.target_vblank);
        let schedule = calc.compute_next_wakeup(&predictor, &clock, timing, released);
        assert!(schedule.hold_off);
        assert!(!schedule.late);
        assert_eq!(schedule.scheduled_wakeup, HostTime(14_000_000));

        // Another vblank is planned normally.
        let other = calc.compute_next_wakeup(&predictor, &clock, timing, Some(HostTime(1)));
        assert!(!other.hold_off);
    }

    #[test]
    fn completion_before_release_is_zero_delta() {
        let timing = RenderTiming {
            last_release: HostTime(9),
            last_completion: HostTime(3),
        };
        assert_eq!(timing.render_delta(), Duration::ZERO);
    }
}
