// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linux backend for latchpace.
//!
//! This crate provides the collaborators a
//! [`FrameLimiter`](latchpace_core::limiter::FrameLimiter) needs on Linux:
//!
//! - [`MonotonicClock`]: `CLOCK_MONOTONIC` reads
//! - [`TimerFd`]: absolute one-shot release timer on a `timerfd`
//! - [`RefreshPredictor`]: vblank prediction from the last observed vblank
//! - [`TimerThread`]: a named thread delivering timer expiries
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use latchpace_backend_linux::{
//!     MonotonicClock, PredictorConfig, RefreshPredictor, TimerFd, TimerThread,
//! };
//! use latchpace_core::limiter::{FrameLimiter, PacingConfig};
//! # use latchpace_core::timestamp::{PacedBuffer, TimestampLock};
//! # #[derive(Debug)]
//! # struct Frame(TimestampLock);
//! # impl PacedBuffer for Frame {
//! #     fn timestamp(&self) -> &TimestampLock { &self.0 }
//! # }
//!
//! # fn main() -> std::io::Result<()> {
//! let timer = Arc::new(TimerFd::new()?);
//! let predictor = RefreshPredictor::new(MonotonicClock, PredictorConfig::new());
//! let limiter = Arc::new(FrameLimiter::<Frame>::new(
//!     PacingConfig::new().with_total_buffers(3),
//!     MonotonicClock,
//!     predictor,
//!     Arc::clone(&timer),
//! ));
//! let mut release_thread = TimerThread::for_limiter(Arc::clone(&limiter), timer)?;
//!
//! // ... producer calls limiter.mark_frame(...) per frame ...
//!
//! let _ = limiter.shutdown();
//! release_thread.stop()?;
//! # Ok(())
//! # }
//! ```

mod driver;
mod time;
mod timer;
mod vblank;

pub use driver::{THREAD_NAME, TimerThread};
pub use time::{MonotonicClock, now};
pub use timer::TimerFd;
pub use vblank::{PredictorConfig, RefreshPredictor, predict};
