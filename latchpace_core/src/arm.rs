// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The arm/disarm state machine that drives the release cycle.
//!
//! [`ArmController`] owns the single outstanding [`FrameSchedule`]. It is
//! either *disarmed* or *armed*; arming computes a schedule and programs the
//! release timer, and a timer fire disarms, releases the oldest buffer, and
//! immediately re-arms pre-emptively so the cycle keeps going without further
//! producer input.
//!
//! The controller remembers which vblank the last release was made for.
//! Until the predictor moves past it, schedules for that vblank are
//! [`hold_off`](FrameSchedule::hold_off()) schedules: they wake at its latch
//! deadline and release nothing. One release per vblank keeps a late cycle
//! from draining the whole ledger at once.
//!
//! ```text
//!            arm(Forced | Preemptive)
//!   Disarmed ────────────────────────► Armed ──┐ arm(Forced): replace schedule
//!      ▲                                 │  ◄───┘ arm(Preemptive): no-op
//!      │        on_timer_fire()          │
//!      └─────────────────────────────────┘
//!            (release oldest, then arm(Preemptive))
//! ```
//!
//! # Locking
//!
//! The schedule lock only covers bookkeeping. The predictor, the clock, and
//! the timer are called with no lock held. Each arm takes a generation number
//! when it starts; a schedule is only committed if no newer arm (or a disarm)
//! happened while it was being computed. After programming the timer, the
//! arming thread re-checks the generation and reprograms with the newest
//! committed schedule if it lost a race, so the last committed schedule is
//! always the one the timer ends up with.
//!
//! The armed state is mirrored in an [`ArmedFlag`] that observers can block on
//! without touching the schedule lock. It is raised when a schedule commits,
//! so an observer woken by it finds that schedule in
//! [`current_schedule`](ArmController::current_schedule).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::backend::{Clock, ReleaseTimer, VBlankPredictor};
use crate::ledger::BufferLedger;
use crate::schedule::{FrameSchedule, RenderTiming, ScheduleCalculator};
use crate::time::HostTime;
use crate::timestamp::PacedBuffer;

/// How an arm request treats an already armed controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArmMode {
    /// Keep the cycle alive: do nothing if already armed.
    Preemptive,
    /// Fresh timing is available: recompute and replace any outstanding
    /// schedule.
    Forced,
}

/// Result of [`ArmController::arm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArmOutcome {
    /// The controller has been shut down.
    Stopped,
    /// Pre-emptive request while already armed; nothing changed.
    AlreadyArmed,
    /// A newer arm or a disarm replaced this request before it committed.
    Superseded,
    /// The schedule was committed and the timer programmed.
    Armed(FrameSchedule),
}

/// Result of [`ArmController::on_timer_fire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FireOutcome {
    /// The controller was not armed (spurious or post-shutdown fire).
    Ignored,
    /// The latch deadline of an already released vblank passed. Nothing was
    /// released; the controller re-armed for the next vblank.
    HeldOff {
        /// What the pre-emptive re-arm did.
        rearm: ArmOutcome,
    },
    /// The controller disarmed, released, and re-armed.
    Released {
        /// Release time stamped on the buffer.
        released_at: HostTime,
        /// Buffers held before the release; zero means the ledger was empty.
        acquired_before: u32,
        /// What the pre-emptive re-arm did.
        rearm: ArmOutcome,
    },
}

/// Borrowed external collaborators for one operation.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Monotonic clock.
    pub clock: &'a dyn Clock,
    /// Vblank predictor, only ever peeked.
    pub predictor: &'a dyn VBlankPredictor,
    /// One-shot release timer.
    pub timer: &'a dyn ReleaseTimer,
}

impl core::fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// The armed state as a wait-able atomic.
///
/// Set when a schedule is committed and cleared when a fire or a stop
/// discards it.
#[derive(Debug, Default)]
pub struct ArmedFlag {
    armed: AtomicBool,
    gate: Mutex<()>,
    changed: Condvar,
}

impl ArmedFlag {
    /// Returns the current armed state.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Stores `armed` and wakes waiters if it changed. Returns the previous
    /// value.
    fn set(&self, armed: bool) -> bool {
        let previous = self.armed.swap(armed, Ordering::AcqRel);
        if previous != armed {
            let _gate = self.gate.lock();
            self.changed.notify_all();
        }
        previous
    }

    /// Blocks while the armed state equals `armed`.
    pub fn wait_while(&self, armed: bool) {
        let mut gate = self.gate.lock();
        while self.is_armed() == armed {
            self.changed.wait(&mut gate);
        }
    }

    /// Like [`wait_while`](Self::wait_while) with a timeout. Returns `true` if
    /// the state moved away from `armed`.
    pub fn wait_while_for(&self, armed: bool, timeout: std::time::Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.gate.lock();
        while self.is_armed() == armed {
            if self.changed.wait_until(&mut gate, deadline).timed_out() {
                return self.is_armed() != armed;
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug)]
struct Committed {
    generation: u64,
    schedule: FrameSchedule,
}

#[derive(Debug, Default)]
struct ScheduleState {
    generation: u64,
    current: Option<Committed>,
    timing: RenderTiming,
    /// Target vblank of the last single release.
    released_for: Option<HostTime>,
}

impl ScheduleState {
    fn discard(&mut self) {
        self.generation += 1;
        self.current = None;
    }
}

/// Owns the outstanding schedule and sequences arm, fire, and shutdown.
#[derive(Debug)]
pub struct ArmController {
    state: Mutex<ScheduleState>,
    armed: ArmedFlag,
    running: AtomicBool,
    calculator: ScheduleCalculator,
    late_releases: AtomicU64,
    ignored_fires: AtomicU64,
}

impl ArmController {
    /// Creates a running, disarmed controller.
    #[must_use]
    pub fn new(calculator: ScheduleCalculator) -> Self {
        Self {
            state: Mutex::new(ScheduleState::default()),
            armed: ArmedFlag::default(),
            running: AtomicBool::new(true),
            calculator,
            late_releases: AtomicU64::new(0),
            ignored_fires: AtomicU64::new(0),
        }
    }

    /// Records the latest render-timing sample for future schedules.
    pub fn observe(&self, timing: RenderTiming) {
        self.state.lock().timing = timing;
    }

    /// Computes a schedule and programs the timer.
    pub fn arm(&self, mode: ArmMode, env: Collaborators<'_>) -> ArmOutcome {
        let (generation, timing, released_for) = {
            let mut state = self.state.lock();
            if !self.running.load(Ordering::Acquire) {
                return ArmOutcome::Stopped;
            }
            if mode == ArmMode::Preemptive && self.armed.is_armed() {
                return ArmOutcome::AlreadyArmed;
            }
            state.generation += 1;
            (state.generation, state.timing, state.released_for)
        };

        let schedule = self.calculator.compute_next_wakeup(
            env.predictor,
            env.clock,
            timing,
            released_for,
        );

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return ArmOutcome::Superseded;
            }
            state.current = Some(Committed {
                generation,
                schedule,
            });
            let _ = self.armed.set(true);
        }

        if schedule.late {
            self.late_releases.fetch_add(1, Ordering::Relaxed);
        }
        self.program(generation, schedule.scheduled_wakeup, env.timer);
        ArmOutcome::Armed(schedule)
    }

    fn program(&self, mut generation: u64, mut deadline: HostTime, timer: &dyn ReleaseTimer) {
        loop {
            timer.arm(deadline);

            let state = self.state.lock();
            if state.generation == generation {
                return;
            }
            match state.current {
                // A newer schedule committed meanwhile and may have been
                // programmed before ours; make sure it is the one that sticks.
                Some(newer) if newer.generation == state.generation => {
                    generation = newer.generation;
                    deadline = newer.schedule.scheduled_wakeup;
                }
                // Either a newer arm is still computing and will program
                // itself, or the controller was disarmed.
                _ => return,
            }
        }
    }

    /// Handles a timer expiry: disarm, release the oldest buffer, re-arm.
    ///
    /// A fire for a [`hold_off`](FrameSchedule::hold_off()) schedule releases
    /// nothing.
    pub fn on_timer_fire<B: PacedBuffer>(
        &self,
        ledger: &BufferLedger<B>,
        env: Collaborators<'_>,
    ) -> FireOutcome {
        let fired = {
            let mut state = self.state.lock();
            if self.running.load(Ordering::Acquire) && self.armed.set(false) {
                let fired = state.current.map(|c| c.schedule);
                state.discard();
                if let Some(schedule) = fired
                    && !schedule.hold_off
                {
                    state.released_for = Some(schedule.target_vblank);
                }
                Some(fired)
            } else {
                None
            }
        };
        let Some(fired) = fired else {
            self.ignored_fires.fetch_add(1, Ordering::Relaxed);
            return FireOutcome::Ignored;
        };

        if fired.is_some_and(|s| s.hold_off) {
            let rearm = self.arm(ArmMode::Preemptive, env);
            return FireOutcome::HeldOff { rearm };
        }

        let released_at = env.clock.now();
        let acquired_before = ledger.release_oldest(released_at);
        let rearm = self.arm(ArmMode::Preemptive, env);

        FireOutcome::Released {
            released_at,
            acquired_before,
            rearm,
        }
    }

    /// Stops the controller: disarms and cancels the timer. Later arms and
    /// fires are no-ops. Returns `false` if it was already stopped.
    pub fn stop(&self, timer: &dyn ReleaseTimer) -> bool {
        {
            let mut state = self.state.lock();
            if !self.running.swap(false, Ordering::AcqRel) {
                return false;
            }
            state.discard();
            let _ = self.armed.set(false);
        }
        timer.disarm();
        true
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The wait-able armed flag.
    #[must_use]
    pub fn armed_flag(&self) -> &ArmedFlag {
        &self.armed
    }

    /// The committed schedule, if armed.
    #[must_use]
    pub fn current_schedule(&self) -> Option<FrameSchedule> {
        self.state.lock().current.map(|c| c.schedule)
    }

    /// The render-timing sample the next schedule will use.
    #[must_use]
    pub fn render_timing(&self) -> RenderTiming {
        self.state.lock().timing
    }

    /// Schedules that had to be clamped to "now".
    #[must_use]
    pub fn late_releases(&self) -> u64 {
        self.late_releases.load(Ordering::Relaxed)
    }

    /// Timer fires that arrived while disarmed or stopped.
    #[must_use]
    pub fn ignored_fires(&self) -> u64 {
        self.ignored_fires.load(Ordering::Relaxed)
    }
}
