// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame pacing through strategic buffer release.
//!
//! `latchpace_core` decides when to hand a rendered buffer back to its
//! producer so that the producer's *next* frame completes just before the
//! latch deadline of a predicted vblank. Releasing earlier wastes latency;
//! releasing later misses the refresh.
//!
//! ```text
//!                                       red zone
//!                             delta        |
//!                     <------------------><-->
//! --------------------------------------------------------------
//!                     |                   |  |          |
//! --------------------------------------------------------------
//!                     ^                   ^  ^          ^
//!                  release              done |        vblank
//!                                          latch
//! ```
//!
//! # Architecture
//!
//! ```text
//!   producer thread                         timer thread
//!       │                                        │
//!       ▼                                        ▼
//!   FrameLimiter::mark_frame()          FrameLimiter::on_timer_fire()
//!       │  stamp TimestampLock                   │  disarm
//!       │  BufferLedger::hold()                  │  BufferLedger::release_oldest()
//!       ▼                                        ▼
//!   ArmController::arm(Forced)          ArmController::arm(Preemptive)
//!       │                                        │
//!       └──────► ScheduleCalculator ◄────────────┘
//!                     │  peek VBlankPredictor, read Clock
//!                     ▼
//!               ReleaseTimer::arm(scheduled_wakeup)
//! ```
//!
//! **[`timestamp`]**: Per-buffer [`BufferTimestamp`](timestamp::BufferTimestamp)
//! behind the buffer's own lock, and the [`PacedBuffer`](timestamp::PacedBuffer)
//! trait buffers implement.
//!
//! **[`ledger`]**: FIFO of held buffers with capacity accounting.
//!
//! **[`schedule`]**: Pure wakeup computation from a vblank prediction and the
//! last observed release-to-completion delta.
//!
//! **[`arm`]**: The single-outstanding-schedule arm/disarm state machine and
//! the wait-able armed flag.
//!
//! **[`limiter`]**: [`FrameLimiter`](limiter::FrameLimiter), the façade tying
//! the above together with the external collaborators.
//!
//! **[`backend`]**: Collaborator traits: [`Clock`](backend::Clock),
//! [`VBlankPredictor`](backend::VBlankPredictor),
//! [`ReleaseTimer`](backend::ReleaseTimer).
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pacing instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! **[`time`]**: Nanosecond [`HostTime`](time::HostTime) and
//! [`Duration`](time::Duration).
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod arm;
pub mod backend;
pub mod ledger;
pub mod limiter;
pub mod schedule;
pub mod time;
pub mod timestamp;
pub mod trace;

#[cfg(test)]
mod testing;
