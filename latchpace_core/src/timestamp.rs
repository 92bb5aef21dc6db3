// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-buffer timestamp records.
//!
//! Every buffer that passes through the limiter carries a [`TimestampLock`]:
//! the producer writes submission and completion times when it hands the
//! buffer over, and the ledger writes the release time when it hands the
//! buffer back. The lock is private to that one buffer, so contention scales
//! with buffers in flight rather than with total traffic.

use parking_lot::Mutex;

use crate::schedule::RenderTiming;
use crate::time::HostTime;

/// Timestamps for one buffer's trip through the pacing cycle.
///
/// A `release_time` of [`HostTime::ZERO`] means the buffer has not been
/// released since it was last submitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BufferTimestamp {
    /// When the producer submitted the frame (CPU side).
    pub cpu_time: HostTime,
    /// When rendering into the buffer completed (GPU side).
    pub gpu_time: HostTime,
    /// When the limiter released the buffer back to the producer.
    pub release_time: HostTime,
}

impl BufferTimestamp {
    /// Returns `true` once the limiter has released the buffer.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        !self.release_time.is_zero()
    }
}

/// A [`BufferTimestamp`] behind the owning buffer's lock.
#[derive(Debug, Default)]
pub struct TimestampLock {
    record: Mutex<BufferTimestamp>,
}

impl TimestampLock {
    /// Creates an empty, never-released record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> BufferTimestamp {
        *self.record.lock()
    }

    /// Records a new submission.
    ///
    /// If the buffer was released earlier, that release paired with the new
    /// completion time is the render latency the producer needed for this
    /// frame, returned as a [`RenderTiming`] sample. The release time is then
    /// cleared because the buffer is held again.
    pub(crate) fn submit(&self, cpu_time: HostTime, gpu_time: HostTime) -> Option<RenderTiming> {
        let mut record = self.record.lock();
        let sample = record.is_released().then_some(RenderTiming {
            last_release: record.release_time,
            last_completion: gpu_time,
        });
        *record = BufferTimestamp {
            cpu_time,
            gpu_time,
            release_time: HostTime::ZERO,
        };
        sample
    }

    /// Stamps the release time.
    pub(crate) fn stamp_release(&self, at: HostTime) {
        self.record.lock().release_time = at;
    }
}

/// A buffer the limiter can hold and release.
///
/// The limiter keeps buffers as `Arc<B>` so it can retain them independently
/// of the producer; dropping the last handle is what returns the buffer to
/// its owner.
pub trait PacedBuffer: Send + Sync {
    /// The buffer's timestamp record.
    fn timestamp(&self) -> &TimestampLock;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_submission_has_no_sample() {
        let lock = TimestampLock::new();
        assert_eq!(lock.submit(HostTime(10), HostTime(20)), None);

        let record = lock.snapshot();
        assert_eq!(record.cpu_time, HostTime(10));
        assert_eq!(record.gpu_time, HostTime(20));
        assert!(!record.is_released());
    }

    #[test]
    fn resubmission_after_release_yields_sample_and_clears_release() {
        let lock = TimestampLock::new();
        let _ = lock.submit(HostTime(10), HostTime(20));
        lock.stamp_release(HostTime(1_000_000));
        assert!(lock.snapshot().is_released());

        let sample = lock.submit(HostTime(5_000_000), HostTime(7_000_000));
        assert_eq!(
            sample,
            Some(RenderTiming {
                last_release: HostTime(1_000_000),
                last_completion: HostTime(7_000_000),
            })
        );
        assert!(
            !lock.snapshot().is_released(),
            "a re-held buffer is not released"
        );
    }
}
