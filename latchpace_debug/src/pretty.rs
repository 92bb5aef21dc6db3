// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Host times
//! are printed in microseconds.

use std::io::Write;

use latchpace_core::arm::ArmMode;
use latchpace_core::time::HostTime;
use latchpace_core::trace::{
    BulkReleaseEvent, HoldEvent, ReleaseEvent, ScheduleEvent, TimerFireEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(t: HostTime) -> f64 {
    t.as_micros_f64()
}

fn mode_name(mode: ArmMode) -> &'static str {
    match mode {
        ArmMode::Preemptive => "preemptive",
        ArmMode::Forced => "forced",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_hold(&mut self, e: &HoldEvent) {
        let capacity = if e.over_capacity { " OVER" } else { "" };
        let _ = writeln!(
            self.writer,
            "[hold] at {:.1}µs acquired={}/{}{capacity}",
            us(e.at),
            e.acquired,
            e.total,
        );
    }

    fn on_schedule(&mut self, e: &ScheduleEvent) {
        let status = match (e.late, e.hold_off) {
            (true, _) => "LATE",
            (false, true) => "hold",
            (false, false) => "ok",
        };
        let _ = writeln!(
            self.writer,
            "[arm:{}] at {:.1}µs wakeup={:.1}µs latch={:.1}µs vblank={:.1}µs {status}",
            mode_name(e.mode),
            us(e.at),
            us(e.scheduled_wakeup),
            us(e.target_latch),
            us(e.target_vblank),
        );
    }

    fn on_timer_fire(&mut self, e: &TimerFireEvent) {
        let ignored = if e.ignored { " ignored" } else { "" };
        let _ = writeln!(self.writer, "[fire] at {:.1}µs{ignored}", us(e.at));
    }

    fn on_release(&mut self, e: &ReleaseEvent) {
        let _ = writeln!(
            self.writer,
            "[release] at {:.1}µs held={}",
            us(e.released_at),
            e.acquired_before,
        );
    }

    fn on_bulk_release(&mut self, e: &BulkReleaseEvent) {
        let _ = match e.new_total {
            Some(total) => writeln!(
                self.writer,
                "[release:all] at {:.1}µs released={} total={total}",
                us(e.at),
                e.released,
            ),
            None => writeln!(
                self.writer,
                "[release:all] at {:.1}µs released={}",
                us(e.at),
                e.released,
            ),
        };
    }
}
