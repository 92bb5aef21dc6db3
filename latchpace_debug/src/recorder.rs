// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use latchpace_core::arm::ArmMode;
use latchpace_core::time::HostTime;
use latchpace_core::trace::{
    BulkReleaseEvent, HoldEvent, ReleaseEvent, ScheduleEvent, TimerFireEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_HOLD: u8 = 1;
const TAG_SCHEDULE: u8 = 2;
const TAG_TIMER_FIRE: u8 = 3;
const TAG_RELEASE: u8 = 4;
const TAG_BULK_RELEASE: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_time(&mut self, t: HostTime) {
        self.write_u64(t.nanos());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_option_u32(&mut self, v: Option<u32>) {
        match v {
            Some(val) => {
                self.write_u8(1);
                self.write_u32(val);
            }
            None => {
                self.write_u8(0);
                self.write_u32(0);
            }
        }
    }

    fn write_mode(&mut self, mode: ArmMode) {
        self.write_u8(match mode {
            ArmMode::Preemptive => 0,
            ArmMode::Forced => 1,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_hold(&mut self, e: &HoldEvent) {
        self.write_u8(TAG_HOLD);
        self.write_time(e.at);
        self.write_u32(e.acquired);
        self.write_u32(e.total);
        self.write_bool(e.over_capacity);
    }

    fn on_schedule(&mut self, e: &ScheduleEvent) {
        self.write_u8(TAG_SCHEDULE);
        self.write_time(e.at);
        self.write_mode(e.mode);
        self.write_time(e.target_vblank);
        self.write_time(e.target_latch);
        self.write_time(e.scheduled_wakeup);
        self.write_bool(e.late);
        self.write_bool(e.hold_off);
    }

    fn on_timer_fire(&mut self, e: &TimerFireEvent) {
        self.write_u8(TAG_TIMER_FIRE);
        self.write_time(e.at);
        self.write_bool(e.ignored);
    }

    fn on_release(&mut self, e: &ReleaseEvent) {
        self.write_u8(TAG_RELEASE);
        self.write_time(e.released_at);
        self.write_u32(e.acquired_before);
    }

    fn on_bulk_release(&mut self, e: &BulkReleaseEvent) {
        self.write_u8(TAG_BULK_RELEASE);
        self.write_time(e.at);
        self.write_u32(e.released);
        self.write_option_u32(e.new_total);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`HoldEvent`].
    Hold(HoldEvent),
    /// A [`ScheduleEvent`].
    Schedule(ScheduleEvent),
    /// A [`TimerFireEvent`].
    TimerFire(TimerFireEvent),
    /// A [`ReleaseEvent`].
    Release(ReleaseEvent),
    /// A [`BulkReleaseEvent`].
    BulkRelease(BulkReleaseEvent),
}

impl RecordedEvent {
    /// The host time the event happened at.
    #[must_use]
    pub fn at(&self) -> HostTime {
        match self {
            Self::Hold(e) => e.at,
            Self::Schedule(e) => e.at,
            Self::TimerFire(e) => e.at,
            Self::Release(e) => e.released_at,
            Self::BulkRelease(e) => e.at,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    fn read_option_u32(&mut self) -> Option<Option<u32>> {
        let present = self.read_u8()?;
        let val = self.read_u32()?;
        Some((present != 0).then_some(val))
    }

    fn read_mode(&mut self) -> Option<ArmMode> {
        Some(match self.read_u8()? {
            0 => ArmMode::Preemptive,
            _ => ArmMode::Forced,
        })
    }

    fn decode_hold(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Hold(HoldEvent {
            at: self.read_time()?,
            acquired: self.read_u32()?,
            total: self.read_u32()?,
            over_capacity: self.read_bool()?,
        }))
    }

    fn decode_schedule(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Schedule(ScheduleEvent {
            at: self.read_time()?,
            mode: self.read_mode()?,
            target_vblank: self.read_time()?,
            target_latch: self.read_time()?,
            scheduled_wakeup: self.read_time()?,
            late: self.read_bool()?,
            hold_off: self.read_bool()?,
        }))
    }

    fn decode_timer_fire(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TimerFire(TimerFireEvent {
            at: self.read_time()?,
            ignored: self.read_bool()?,
        }))
    }

    fn decode_release(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Release(ReleaseEvent {
            released_at: self.read_time()?,
            acquired_before: self.read_u32()?,
        }))
    }

    fn decode_bulk_release(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BulkRelease(BulkReleaseEvent {
            at: self.read_time()?,
            released: self.read_u32()?,
            new_total: self.read_option_u32()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_HOLD => self.decode_hold(),
            TAG_SCHEDULE => self.decode_schedule(),
            TAG_TIMER_FIRE => self.decode_timer_fire(),
            TAG_RELEASE => self.decode_release(),
            TAG_BULK_RELEASE => self.decode_bulk_release(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
