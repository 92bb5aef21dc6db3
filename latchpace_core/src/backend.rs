// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator contract for platform integrations.
//!
//! The limiter does not read clocks, predict vblanks, or sleep by itself.
//! Backends provide the following pieces:
//!
//! - **Clock**: [`Clock::now`] reads the platform's monotonic clock in
//!   nanoseconds.
//!
//! - **Vblank prediction**: [`VBlankPredictor::peek_next_wakeup`] returns the
//!   next vblank and its latch deadline *without* advancing the predictor.
//!
//! - **Release timer**: [`ReleaseTimer::arm`] programs a single one-shot
//!   wakeup, replacing any earlier one. When it expires, the backend calls
//!   [`FrameLimiter::on_timer_fire`](crate::limiter::FrameLimiter::on_timer_fire)
//!   from whatever thread observes the expiry.
//!
//! All three are called without any limiter lock held and are expected to
//! return promptly.
//!
//! # Crate boundaries
//!
//! `latchpace_core` owns the ledger, the schedule model, the arm state
//! machine, and this contract module. Backend crates (such as
//! `latchpace_backend_linux`) depend on `latchpace_core` and provide the
//! collaborators plus a thread that delivers timer fires. Test doubles
//! implement the same traits.

use std::sync::Arc;

use crate::schedule::VBlankSchedule;
use crate::time::HostTime;

/// A monotonic nanosecond clock.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic time.
    fn now(&self) -> HostTime;
}

/// Source of vblank predictions.
pub trait VBlankPredictor: Send + Sync {
    /// Returns the next vblank target and its latch deadline.
    ///
    /// Must not mutate any prediction state.
    fn peek_next_wakeup(&self) -> VBlankSchedule;
}

/// A one-shot timer whose expiry drives the release cycle.
pub trait ReleaseTimer: Send + Sync {
    /// Programs the timer to fire at `deadline`, replacing any pending
    /// deadline. A deadline in the past fires as soon as possible.
    fn arm(&self, deadline: HostTime);

    /// Cancels any pending deadline.
    fn disarm(&self);
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> HostTime {
        (**self).now()
    }
}

impl<T: VBlankPredictor + ?Sized> VBlankPredictor for Arc<T> {
    fn peek_next_wakeup(&self) -> VBlankSchedule {
        (**self).peek_next_wakeup()
    }
}

impl<T: ReleaseTimer + ?Sized> ReleaseTimer for Arc<T> {
    fn arm(&self, deadline: HostTime) {
        (**self).arm(deadline);
    }

    fn disarm(&self) {
        (**self).disarm();
    }
}
