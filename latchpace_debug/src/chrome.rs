// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Holds and releases share one thread row so the FIFO reads left to right;
//! schedules and timer fires get their own rows. A committed schedule is also
//! drawn as a complete (`X`) slice from the moment it was committed to its
//! wakeup, which makes late clamps stand out as zero-width slices.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use latchpace_core::time::HostTime;

use crate::recorder::{RecordedEvent, decode};

const TID_LEDGER: u32 = 0;
const TID_SCHEDULE: u32 = 1;
const TID_TIMER: u32 = 2;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Timestamps are in microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Hold(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Hold",
                    "cat": "Ledger",
                    "ts": us(e.at),
                    "pid": 0,
                    "tid": TID_LEDGER,
                    "s": "t",
                    "args": {
                        "acquired": e.acquired,
                        "total": e.total,
                        "over_capacity": e.over_capacity,
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "Acquired",
                    "ts": us(e.at),
                    "pid": 0,
                    "args": { "acquired": e.acquired }
                }));
            }
            RecordedEvent::Schedule(e) => {
                let name = match (e.late, e.hold_off) {
                    (true, _) => "Schedule (late)",
                    (false, true) => "Schedule (hold)",
                    (false, false) => "Schedule",
                };
                events.push(json!({
                    "ph": "X",
                    "name": name,
                    "cat": "Schedule",
                    "ts": us(e.at),
                    "dur": e.scheduled_wakeup.saturating_duration_since(e.at).as_micros_f64(),
                    "pid": 0,
                    "tid": TID_SCHEDULE,
                    "args": {
                        "mode": format!("{:?}", e.mode),
                        "wakeup_us": us(e.scheduled_wakeup),
                        "latch_us": us(e.target_latch),
                        "vblank_us": us(e.target_vblank),
                        "late": e.late,
                        "hold_off": e.hold_off,
                    }
                }));
            }
            RecordedEvent::TimerFire(e) => {
                let name = if e.ignored {
                    "TimerFire (ignored)"
                } else {
                    "TimerFire"
                };
                events.push(json!({
                    "ph": "i",
                    "name": name,
                    "cat": "Timer",
                    "ts": us(e.at),
                    "pid": 0,
                    "tid": TID_TIMER,
                    "s": "t",
                }));
            }
            RecordedEvent::Release(e) => {
                let acquired = e.acquired_before.saturating_sub(1);
                events.push(json!({
                    "ph": "i",
                    "name": "Release",
                    "cat": "Ledger",
                    "ts": us(e.released_at),
                    "pid": 0,
                    "tid": TID_LEDGER,
                    "s": "t",
                    "args": { "acquired_before": e.acquired_before }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "Acquired",
                    "ts": us(e.released_at),
                    "pid": 0,
                    "args": { "acquired": acquired }
                }));
            }
            RecordedEvent::BulkRelease(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "ReleaseAll",
                    "cat": "Ledger",
                    "ts": us(e.at),
                    "pid": 0,
                    "tid": TID_LEDGER,
                    "s": "p",
                    "args": {
                        "released": e.released,
                        "new_total": e.new_total,
                    }
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "Acquired",
                    "ts": us(e.at),
                    "pid": 0,
                    "args": { "acquired": 0 }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn us(t: HostTime) -> f64 {
    t.as_micros_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use latchpace_core::arm::ArmMode;
    use latchpace_core::trace::{
        BulkReleaseEvent, ReleaseEvent, ScheduleEvent, TimerFireEvent, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_schedule(&ScheduleEvent {
            at: HostTime(1_000_000),
            mode: ArmMode::Forced,
            target_vblank: HostTime(21_000_000),
            target_latch: HostTime(20_000_000),
            scheduled_wakeup: HostTime(18_000_000),
            late: false,
            hold_off: false,
        });
        rec.on_timer_fire(&TimerFireEvent {
            at: HostTime(18_000_000),
            ignored: false,
        });
        rec.on_release(&ReleaseEvent {
            released_at: HostTime(18_000_000),
            acquired_before: 2,
        });
        rec.on_bulk_release(&BulkReleaseEvent {
            at: HostTime(19_000_000),
            released: 1,
            new_total: Some(3),
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 6);

        // The schedule spans from commit to wakeup.
        assert_eq!(parsed[0]["ph"], "X");
        assert_eq!(parsed[0]["ts"], 1000.0);
        assert_eq!(parsed[0]["dur"], 17000.0);
        assert_eq!(parsed[0]["args"]["mode"], "Forced");

        assert_eq!(parsed[1]["name"], "TimerFire");
        assert_eq!(parsed[2]["name"], "Release");

        // Counter track follows the release.
        assert_eq!(parsed[3]["ph"], "C");
        assert_eq!(parsed[3]["args"]["acquired"], 1);

        assert_eq!(parsed[4]["name"], "ReleaseAll");
        assert_eq!(parsed[4]["args"]["new_total"], 3);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty(), "no events");
    }
}
