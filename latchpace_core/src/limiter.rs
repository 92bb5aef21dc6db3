// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame limiter façade.
//!
//! [`FrameLimiter`] ties a [`BufferLedger`] and an [`ArmController`] to the
//! external collaborators and exposes the operations the rest of the
//! compositor calls:
//!
//! - the producer path calls [`mark_frame`](FrameLimiter::mark_frame) for
//!   every completed frame,
//! - whatever thread observes the release timer calls
//!   [`on_timer_fire`](FrameLimiter::on_timer_fire),
//! - swapchain feedback calls
//!   [`set_total_buffers`](FrameLimiter::set_total_buffers).
//!
//! Every operation returns an outcome value instead of logging on its own;
//! callers turn outcomes into [`trace`](crate::trace) events if they want
//! them.

use std::sync::Arc;

use crate::arm::{ArmController, ArmMode, ArmOutcome, ArmedFlag, Collaborators, FireOutcome};
use crate::backend::{Clock, ReleaseTimer, VBlankPredictor};
use crate::ledger::{BufferLedger, HoldOutcome};
use crate::schedule::{FrameSchedule, RenderTiming, ScheduleCalculator};
use crate::time::{Duration, HostTime};
use crate::timestamp::PacedBuffer;

/// Configuration for a [`FrameLimiter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingConfig {
    /// Margin added to "now" when deciding whether a release point is still
    /// ahead. See [`ScheduleCalculator`].
    pub slop: Duration,
    /// Buffer total assumed until swapchain feedback reports one.
    pub initial_total_buffers: u32,
}

impl PacingConfig {
    /// 500 µs of slop and a single buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slop: ScheduleCalculator::DEFAULT_SLOP,
            initial_total_buffers: 1,
        }
    }

    /// Returns a copy with the given slop.
    #[must_use]
    pub const fn with_slop(mut self, slop: Duration) -> Self {
        self.slop = slop;
        self
    }

    /// Returns a copy with the given initial buffer total.
    #[must_use]
    pub const fn with_total_buffers(mut self, total: u32) -> Self {
        self.initial_total_buffers = total;
        self
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`FrameLimiter::mark_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkOutcome {
    /// Render-timing sample produced by this submission, if the buffer had
    /// been released before.
    pub sample: Option<RenderTiming>,
    /// How the ledger took the buffer. `None` after shutdown, when buffers
    /// pass straight through.
    pub hold: Option<HoldOutcome>,
    /// What the forced arm did, if one was requested.
    pub arm: Option<ArmOutcome>,
}

/// Point-in-time counters for a [`FrameLimiter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacingStats {
    /// Whether a schedule is outstanding.
    pub armed: bool,
    /// Buffers currently held.
    pub acquired: u32,
    /// Negotiated buffer total.
    pub total_buffers: u32,
    /// Entries in the FIFO.
    pub held: usize,
    /// Buffers released one at a time by timer fires.
    pub releases: u64,
    /// Holds that went over the negotiated total.
    pub over_capacity_holds: u64,
    /// Schedules clamped to "now" because the release point was missed.
    pub late_releases: u64,
    /// Timer fires that arrived while disarmed or stopped.
    pub ignored_fires: u64,
}

/// Paces a producer by holding its buffers and releasing them on a timer.
///
/// `B` is the buffer type; the limiter keeps `Arc<B>` handles and drops them
/// on release. All methods take `&self` and may be called from any thread.
pub struct FrameLimiter<B> {
    ledger: BufferLedger<B>,
    controller: ArmController,
    clock: Box<dyn Clock>,
    predictor: Box<dyn VBlankPredictor>,
    timer: Box<dyn ReleaseTimer>,
    config: PacingConfig,
}

impl<B> core::fmt::Debug for FrameLimiter<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameLimiter")
            .field("config", &self.config)
            .field("acquired", &self.ledger.acquired())
            .field("armed", &self.controller.armed_flag().is_armed())
            .finish_non_exhaustive()
    }
}

impl<B: PacedBuffer> FrameLimiter<B> {
    /// Creates a running, disarmed limiter with an empty ledger.
    #[must_use]
    pub fn new(
        config: PacingConfig,
        clock: impl Clock + 'static,
        predictor: impl VBlankPredictor + 'static,
        timer: impl ReleaseTimer + 'static,
    ) -> Self {
        Self {
            ledger: BufferLedger::new(config.initial_total_buffers),
            controller: ArmController::new(ScheduleCalculator::new(config.slop)),
            clock: Box::new(clock),
            predictor: Box::new(predictor),
            timer: Box::new(timer),
            config,
        }
    }

    fn env(&self) -> Collaborators<'_> {
        Collaborators {
            clock: &*self.clock,
            predictor: &*self.predictor,
            timer: &*self.timer,
        }
    }

    /// Records a completed frame and holds its buffer.
    ///
    /// `cpu_time` is when the producer submitted the frame and `gpu_time`
    /// when its rendering completed. With `rearm` set, any outstanding
    /// schedule is replaced with one computed from the freshest timing.
    ///
    /// After [`shutdown`](Self::shutdown) the buffer is not held.
    pub fn mark_frame(
        &self,
        buffer: Arc<B>,
        cpu_time: HostTime,
        gpu_time: HostTime,
        rearm: bool,
    ) -> MarkOutcome {
        let sample = buffer.timestamp().submit(cpu_time, gpu_time);
        if let Some(timing) = sample {
            self.controller.observe(timing);
        }

        let hold = self.ledger.hold(buffer);
        let arm = match hold {
            Some(_) if rearm => Some(self.controller.arm(ArmMode::Forced, self.env())),
            _ => None,
        };
        MarkOutcome { sample, hold, arm }
    }

    /// Arms the release cycle.
    pub fn arm(&self, mode: ArmMode) -> ArmOutcome {
        self.controller.arm(mode, self.env())
    }

    /// Delivers a release-timer expiry.
    pub fn on_timer_fire(&self) -> FireOutcome {
        self.controller.on_timer_fire(&self.ledger, self.env())
    }

    /// Applies a new negotiated buffer total from swapchain feedback.
    ///
    /// Every held buffer belongs to the old configuration, so all of them are
    /// released. Returns how many were.
    pub fn set_total_buffers(&self, total: u32) -> u32 {
        self.ledger.set_total_buffers(total);
        self.ledger.release_all()
    }

    /// Releases every held buffer without stamping release times. Returns
    /// how many were held.
    pub fn release_all(&self) -> u32 {
        self.ledger.release_all()
    }

    /// Stops pacing: disarms, cancels the timer, and releases everything.
    ///
    /// Pending and future timer fires become no-ops. Returns `false` if the
    /// limiter was already shut down.
    pub fn shutdown(&self) -> bool {
        let stopped = self.controller.stop(&*self.timer);
        let _ = self.ledger.close();
        stopped
    }
}

impl<B> FrameLimiter<B> {
    /// Snapshot of the limiter's counters.
    #[must_use]
    pub fn stats(&self) -> PacingStats {
        let (acquired, held) = self.ledger.occupancy();
        PacingStats {
            armed: self.controller.armed_flag().is_armed(),
            acquired,
            total_buffers: self.ledger.total_buffers(),
            held,
            releases: self.ledger.releases(),
            over_capacity_holds: self.ledger.over_capacity_holds(),
            late_releases: self.controller.late_releases(),
            ignored_fires: self.controller.ignored_fires(),
        }
    }

    /// The wait-able armed flag.
    #[must_use]
    pub fn armed_flag(&self) -> &ArmedFlag {
        self.controller.armed_flag()
    }

    /// The outstanding schedule, if armed.
    #[must_use]
    pub fn current_schedule(&self) -> Option<FrameSchedule> {
        self.controller.current_schedule()
    }

    /// The render-timing sample the next schedule will use.
    #[must_use]
    pub fn render_timing(&self) -> RenderTiming {
        self.controller.render_timing()
    }

    /// Returns `true` until [`shutdown`](FrameLimiter::shutdown).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// The configuration the limiter was built with.
    #[must_use]
    pub fn config(&self) -> PacingConfig {
        self.config
    }

    /// Reads the limiter's clock.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.now()
    }
}
