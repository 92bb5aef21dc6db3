// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the release cycle.
//!
//! This module provides a [`TraceSink`] trait with per-event methods. All
//! method bodies default to no-ops, so implementing only the events you care
//! about is fine.
//!
//! The limiter itself never emits events: its operations return outcome
//! values ([`HoldOutcome`], [`ArmOutcome`], [`FireOutcome`]) and every event
//! here can be built from one of them plus the time it was observed. That
//! keeps tracing off the locked paths entirely.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::arm::{ArmMode, ArmOutcome, FireOutcome};
use crate::ledger::HoldOutcome;
use crate::schedule::FrameSchedule;
use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a submitted buffer enters the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoldEvent {
    /// When the hold happened.
    pub at: HostTime,
    /// Buffers held after the hold.
    pub acquired: u32,
    /// Negotiated buffer total.
    pub total: u32,
    /// Whether the hold went over the total.
    pub over_capacity: bool,
}

impl HoldEvent {
    /// Builds the event from a hold outcome.
    #[must_use]
    pub fn new(at: HostTime, hold: &HoldOutcome) -> Self {
        Self {
            at,
            acquired: hold.acquired,
            total: hold.total,
            over_capacity: hold.over_capacity,
        }
    }
}

/// Emitted when a schedule is committed and the timer programmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleEvent {
    /// When the schedule was committed.
    pub at: HostTime,
    /// Which arm path committed it.
    pub mode: ArmMode,
    /// Predicted vblank.
    pub target_vblank: HostTime,
    /// Latch deadline of that vblank.
    pub target_latch: HostTime,
    /// Programmed timer deadline.
    pub scheduled_wakeup: HostTime,
    /// Whether the wakeup was clamped to "now".
    pub late: bool,
    /// Whether the target vblank was already released for, so the fire only
    /// waits out its latch.
    pub hold_off: bool,
}

impl ScheduleEvent {
    /// Builds the event from a committed schedule.
    #[must_use]
    pub fn new(at: HostTime, mode: ArmMode, schedule: &FrameSchedule) -> Self {
        Self {
            at,
            mode,
            target_vblank: schedule.target_vblank,
            target_latch: schedule.target_latch,
            scheduled_wakeup: schedule.scheduled_wakeup,
            late: schedule.late,
            hold_off: schedule.hold_off,
        }
    }

    /// Builds the event if `outcome` committed a schedule.
    #[must_use]
    pub fn from_arm(at: HostTime, mode: ArmMode, outcome: &ArmOutcome) -> Option<Self> {
        match outcome {
            ArmOutcome::Armed(schedule) => Some(Self::new(at, mode, schedule)),
            _ => None,
        }
    }
}

/// Emitted for every timer expiry, acted on or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerFireEvent {
    /// When the expiry was delivered.
    pub at: HostTime,
    /// Whether the controller was disarmed and ignored it.
    pub ignored: bool,
}

impl TimerFireEvent {
    /// Builds the event from a fire outcome.
    #[must_use]
    pub fn new(at: HostTime, fire: &FireOutcome) -> Self {
        Self {
            at,
            ignored: matches!(fire, FireOutcome::Ignored),
        }
    }
}

/// Emitted when a timer fire hands the oldest buffer back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseEvent {
    /// Release time stamped on the buffer.
    pub released_at: HostTime,
    /// Buffers held before the release.
    pub acquired_before: u32,
}

impl ReleaseEvent {
    /// Builds the event if `fire` actually released a buffer.
    #[must_use]
    pub fn from_fire(fire: &FireOutcome) -> Option<Self> {
        match *fire {
            FireOutcome::Released {
                released_at,
                acquired_before,
                ..
            } if acquired_before > 0 => Some(Self {
                released_at,
                acquired_before,
            }),
            _ => None,
        }
    }
}

/// Emitted when held buffers are released all at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkReleaseEvent {
    /// When the bulk release happened.
    pub at: HostTime,
    /// How many buffers were released.
    pub released: u32,
    /// The new buffer total, when triggered by swapchain feedback.
    pub new_total: Option<u32>,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the release cycle.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a buffer is held.
    fn on_hold(&mut self, e: &HoldEvent) {
        _ = e;
    }

    /// Called when a schedule is committed.
    fn on_schedule(&mut self, e: &ScheduleEvent) {
        _ = e;
    }

    /// Called for every timer expiry.
    fn on_timer_fire(&mut self, e: &TimerFireEvent) {
        _ = e;
    }

    /// Called when a single buffer is released.
    fn on_release(&mut self, e: &ReleaseEvent) {
        _ = e;
    }

    /// Called when all held buffers are released.
    fn on_bulk_release(&mut self, e: &BulkReleaseEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`HoldEvent`].
    #[inline]
    pub fn hold(&mut self, e: &HoldEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_hold(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ScheduleEvent`].
    #[inline]
    pub fn schedule(&mut self, e: &ScheduleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_schedule(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TimerFireEvent`].
    #[inline]
    pub fn timer_fire(&mut self, e: &TimerFireEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_timer_fire(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ReleaseEvent`].
    #[inline]
    pub fn release(&mut self, e: &ReleaseEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_release(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`BulkReleaseEvent`].
    #[inline]
    pub fn bulk_release(&mut self, e: &BulkReleaseEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_bulk_release(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits everything a timer fire produced: the fire itself, the release
    /// (if a buffer was held), and the re-armed schedule (if one was
    /// committed).
    #[inline]
    pub fn fire(&mut self, at: HostTime, fire: &FireOutcome) {
        self.timer_fire(&TimerFireEvent::new(at, fire));
        if let Some(release) = ReleaseEvent::from_fire(fire) {
            self.release(&release);
        }
        if let FireOutcome::Released { rearm, .. } | FireOutcome::HeldOff { rearm } = fire
            && let Some(schedule) = ScheduleEvent::from_arm(at, ArmMode::Preemptive, rearm)
        {
            self.schedule(&schedule);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> FrameSchedule {
        FrameSchedule {
            target_vblank: HostTime(21_000_000),
            target_latch: HostTime(20_000_000),
            scheduled_wakeup: HostTime(18_000_000),
            late: false,
            hold_off: false,
        }
    }

    #[test]
    fn hold_event_from_outcome() {
        let evt = HoldEvent::new(
            HostTime(5),
            &HoldOutcome {
                acquired: 3,
                total: 2,
                over_capacity: true,
            },
        );
        assert_eq!(evt.at, HostTime(5));
        assert_eq!(evt.acquired, 3);
        assert!(evt.over_capacity);
    }

    #[test]
    fn schedule_event_only_for_committed_arms() {
        let armed = ArmOutcome::Armed(sample_schedule());
        let evt = ScheduleEvent::from_arm(HostTime(1), ArmMode::Forced, &armed);
        assert_eq!(evt.map(|e| e.scheduled_wakeup), Some(HostTime(18_000_000)));
        for outcome in [
            ArmOutcome::Stopped,
            ArmOutcome::AlreadyArmed,
            ArmOutcome::Superseded,
        ] {
            assert_eq!(
                ScheduleEvent::from_arm(HostTime(1), ArmMode::Forced, &outcome),
                None
            );
        }
    }

    #[test]
    fn release_event_skips_empty_ledger() {
        let fire = |acquired_before| FireOutcome::Released {
            released_at: HostTime(7),
            acquired_before,
            rearm: ArmOutcome::AlreadyArmed,
        };
        assert_eq!(ReleaseEvent::from_fire(&fire(0)), None);
        assert_eq!(
            ReleaseEvent::from_fire(&fire(2)),
            Some(ReleaseEvent {
                released_at: HostTime(7),
                acquired_before: 2,
            })
        );
        assert_eq!(ReleaseEvent::from_fire(&FireOutcome::Ignored), None);
        let held_off = FireOutcome::HeldOff {
            rearm: ArmOutcome::AlreadyArmed,
        };
        assert_eq!(ReleaseEvent::from_fire(&held_off), None);
        assert!(!TimerFireEvent::new(HostTime(7), &held_off).ignored);
        assert!(TimerFireEvent::new(HostTime(7), &FireOutcome::Ignored).ignored);
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_hold(&HoldEvent {
            at: HostTime(0),
            acquired: 1,
            total: 1,
            over_capacity: false,
        });
        sink.on_schedule(&ScheduleEvent::new(
            HostTime(0),
            ArmMode::Preemptive,
            &sample_schedule(),
        ));
        sink.on_bulk_release(&BulkReleaseEvent {
            at: HostTime(0),
            released: 2,
            new_total: Some(3),
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.timer_fire(&TimerFireEvent {
            at: HostTime(0),
            ignored: true,
        });
        tracer.fire(HostTime(0), &FireOutcome::Ignored);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_fans_out_fire_outcomes() {
        #[derive(Default)]
        struct RecordingSink {
            fires: Vec<bool>,
            releases: Vec<u32>,
            schedules: Vec<ArmMode>,
        }
        impl TraceSink for RecordingSink {
            fn on_timer_fire(&mut self, e: &TimerFireEvent) {
                self.fires.push(e.ignored);
            }
            fn on_release(&mut self, e: &ReleaseEvent) {
                self.releases.push(e.acquired_before);
            }
            fn on_schedule(&mut self, e: &ScheduleEvent) {
                self.schedules.push(e.mode);
            }
        }

        let mut sink = RecordingSink::default();
        {
            let mut tracer = Tracer::new(&mut sink);
            tracer.fire(HostTime(1), &FireOutcome::Ignored);
            tracer.fire(
                HostTime(2),
                &FireOutcome::Released {
                    released_at: HostTime(2),
                    acquired_before: 3,
                    rearm: ArmOutcome::Armed(sample_schedule()),
                },
            );
            tracer.fire(
                HostTime(3),
                &FireOutcome::HeldOff {
                    rearm: ArmOutcome::Armed(sample_schedule()),
                },
            );
        }
        assert_eq!(sink.fires, [true, false, false]);
        assert_eq!(sink.releases, [3]);
        assert_eq!(sink.schedules, [ArmMode::Preemptive, ArmMode::Preemptive]);
    }
}
