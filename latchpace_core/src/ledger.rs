// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The FIFO of buffers currently held back from the producer.
//!
//! [`BufferLedger`] owns shared handles to held buffers in submission order
//! and counts them against the buffer total negotiated by swapchain feedback.
//! Going over that total is reported, never refused: admission control
//! belongs to the feedback protocol upstream.
//!
//! # Locking
//!
//! One ledger lock guards the FIFO and the acquired count together. Releasing
//! the oldest buffer stamps its [`TimestampLock`](crate::timestamp::TimestampLock)
//! while the ledger lock is held; that nested order (ledger, then one buffer)
//! is the only one used anywhere. Handles leave the ledger under the lock but
//! are dropped after it is released, since dropping the last handle may hand
//! the buffer back to its producer.
//!
//! [`close`](BufferLedger::close) releases everything and refuses later holds
//! under the same lock, so no hold can slip in behind it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::time::HostTime;
use crate::timestamp::PacedBuffer;

/// Result of [`BufferLedger::hold`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HoldOutcome {
    /// Buffers held after this hold.
    pub acquired: u32,
    /// Negotiated buffer total at the time of the hold.
    pub total: u32,
    /// Whether `acquired` went over `total`.
    pub over_capacity: bool,
}

#[derive(Debug)]
struct Held<B> {
    buffers: VecDeque<Arc<B>>,
    acquired: u32,
    closed: bool,
}

/// FIFO of held buffers plus capacity accounting.
#[derive(Debug)]
pub struct BufferLedger<B> {
    held: Mutex<Held<B>>,
    total_buffers: AtomicU32,
    over_capacity_holds: AtomicU64,
    releases: AtomicU64,
}

impl<B: PacedBuffer> BufferLedger<B> {
    /// Creates an empty ledger expecting `total_buffers` buffers.
    #[must_use]
    pub fn new(total_buffers: u32) -> Self {
        Self {
            held: Mutex::new(Held {
                buffers: VecDeque::new(),
                acquired: 0,
                closed: false,
            }),
            total_buffers: AtomicU32::new(total_buffers),
            over_capacity_holds: AtomicU64::new(0),
            releases: AtomicU64::new(0),
        }
    }

    /// Appends `buffer` to the tail of the FIFO.
    ///
    /// Never rejects for capacity: going over the negotiated total bumps the
    /// over-capacity counter and is flagged in the outcome. Returns `None`,
    /// and drops the handle, once the ledger is [closed](Self::close).
    pub fn hold(&self, buffer: Arc<B>) -> Option<HoldOutcome> {
        let acquired = {
            let mut held = self.held.lock();
            if held.closed {
                None
            } else {
                held.buffers.push_back(buffer);
                held.acquired += 1;
                Some(held.acquired)
            }
        }?;

        let total = self.total_buffers.load(Ordering::Acquire);
        let over_capacity = acquired > total;
        if over_capacity {
            self.over_capacity_holds.fetch_add(1, Ordering::Relaxed);
        }
        Some(HoldOutcome {
            acquired,
            total,
            over_capacity,
        })
    }

    /// Releases the oldest held buffer, stamping its release time with `now`.
    ///
    /// Returns the acquired count *before* the release. On an empty ledger
    /// this is a no-op returning the unchanged count.
    pub fn release_oldest(&self, now: HostTime) -> u32 {
        let (released, acquired_before) = {
            let mut held = self.held.lock();
            let acquired_before = held.acquired;
            let Some(buffer) = held.buffers.pop_front() else {
                return acquired_before;
            };
            buffer.timestamp().stamp_release(now);
            held.acquired -= 1;
            (buffer, acquired_before)
        };
        self.releases.fetch_add(1, Ordering::Relaxed);
        drop(released);
        acquired_before
    }

    /// Releases every held buffer at once and returns the prior count.
    ///
    /// Bulk-released buffers are not stamped: they belong to a swapchain
    /// configuration that no longer exists, so their timings would poison the
    /// render-latency model.
    pub fn release_all(&self) -> u32 {
        let (released, acquired_before) = {
            let mut held = self.held.lock();
            let acquired_before = held.acquired;
            held.acquired = 0;
            (core::mem::take(&mut held.buffers), acquired_before)
        };
        drop(released);
        acquired_before
    }

    /// Releases every held buffer and refuses all later holds. Returns the
    /// prior count.
    pub fn close(&self) -> u32 {
        let (released, acquired_before) = {
            let mut held = self.held.lock();
            held.closed = true;
            let acquired_before = held.acquired;
            held.acquired = 0;
            (core::mem::take(&mut held.buffers), acquired_before)
        };
        drop(released);
        acquired_before
    }
}

impl<B> BufferLedger<B> {
    /// Updates the negotiated buffer total.
    pub fn set_total_buffers(&self, total: u32) {
        self.total_buffers.store(total, Ordering::Release);
    }

    /// The negotiated buffer total.
    #[must_use]
    pub fn total_buffers(&self) -> u32 {
        self.total_buffers.load(Ordering::Acquire)
    }

    /// Number of buffers currently held.
    #[must_use]
    pub fn acquired(&self) -> u32 {
        self.held.lock().acquired
    }

    /// Number of entries in the FIFO.
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.lock().buffers.len()
    }

    /// The acquired count and the FIFO length, read under one lock.
    #[must_use]
    pub fn occupancy(&self) -> (u32, usize) {
        let held = self.held.lock();
        (held.acquired, held.buffers.len())
    }

    /// Returns `true` once [`close`](BufferLedger::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.held.lock().closed
    }

    /// Returns `true` when nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.lock().buffers.is_empty()
    }

    /// How many holds went over the negotiated total.
    #[must_use]
    pub fn over_capacity_holds(&self) -> u64 {
        self.over_capacity_holds.load(Ordering::Relaxed)
    }

    /// How many buffers were released one at a time by
    /// [`release_oldest`](Self::release_oldest).
    #[must_use]
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}
