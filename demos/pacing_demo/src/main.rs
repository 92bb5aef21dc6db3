// Copyright 2026 the Latchpace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated producer paced by a [`FrameLimiter`].
//!
//! Runs until 120 buffers have been released against a manual clock, a fixed
//! 60 Hz vblank grid, and a timer that only records its deadline. Each vblank
//! gets at most one release, so a fire right after one only waits out the
//! next latch. The producer renders into a
//! three-buffer swapchain with jittered costs and the occasional spike, so
//! both on-time and late schedules show up. Halfway through, the swapchain is
//! renegotiated to two buffers. Events go to a
//! [`PrettyPrintSink`](latchpace_debug::pretty::PrettyPrintSink) and a
//! [`RecorderSink`](latchpace_debug::recorder::RecorderSink), and the
//! recording is exported as Chrome trace JSON.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use latchpace_core::arm::ArmMode;
use latchpace_core::backend::{Clock, ReleaseTimer, VBlankPredictor};
use latchpace_core::limiter::{FrameLimiter, PacingConfig, PacingStats};
use latchpace_core::schedule::VBlankSchedule;
use latchpace_core::time::{Duration, HostTime};
use latchpace_core::timestamp::{PacedBuffer, TimestampLock};
use latchpace_core::trace::{
    BulkReleaseEvent, HoldEvent, ReleaseEvent, ScheduleEvent, TimerFireEvent, TraceSink, Tracer,
};

use latchpace_debug::pretty::PrettyPrintSink;
use latchpace_debug::recorder::RecorderSink;

const CYCLES: u64 = 120;
/// 16.6ms refresh interval in nanoseconds (≈60 Hz).
const REFRESH_INTERVAL_NS: u64 = 16_666_667;
const RED_ZONE_NS: u64 = 1_650_000;
/// Delay between a timer deadline and the release thread running.
const TIMER_LATENCY_NS: u64 = 80_000;
const SWAPCHAIN_LEN: u32 = 3;

// -- simulated collaborators -----------------------------------------------

#[derive(Debug, Default)]
struct SimClock(AtomicU64);

impl SimClock {
    fn set(&self, t: HostTime) {
        self.0.store(t.nanos(), Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now(&self) -> HostTime {
        HostTime(self.0.load(Ordering::SeqCst))
    }
}

/// Vblanks on a fixed grid starting at zero.
#[derive(Debug)]
struct FixedRefresh {
    clock: Arc<SimClock>,
}

impl VBlankPredictor for FixedRefresh {
    fn peek_next_wakeup(&self) -> VBlankSchedule {
        let earliest = self.clock.now().nanos() + RED_ZONE_NS;
        let vblank = HostTime((earliest / REFRESH_INTERVAL_NS + 1) * REFRESH_INTERVAL_NS);
        VBlankSchedule {
            target_vblank: vblank,
            latch_deadline: vblank.saturating_sub(Duration(RED_ZONE_NS)),
        }
    }
}

/// Holds the pending deadline; zero means disarmed.
#[derive(Debug, Default)]
struct SimTimer(AtomicU64);

impl SimTimer {
    fn pending(&self) -> Option<HostTime> {
        match self.0.load(Ordering::SeqCst) {
            0 => None,
            t => Some(HostTime(t)),
        }
    }

    fn expire(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

impl ReleaseTimer for SimTimer {
    fn arm(&self, deadline: HostTime) {
        self.0.store(deadline.nanos().max(1), Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct SwapchainImage {
    timestamp: TimestampLock,
}

impl PacedBuffer for SwapchainImage {
    fn timestamp(&self) -> &TimestampLock {
        &self.timestamp
    }
}

/// Deterministic render costs: 3–9 ms, with a 14 ms spike every 17th frame.
#[derive(Debug)]
struct RenderCost(u64);

impl RenderCost {
    fn next(&mut self, frame: u64) -> Duration {
        if frame % 17 == 16 {
            return Duration::from_millis(14);
        }
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        Duration(3_000_000 + (self.0 >> 33) % 6_000_000)
    }
}

// -- fan-out sink ----------------------------------------------------------

struct Tee<'a> {
    pretty: &'a mut PrettyPrintSink,
    recorder: &'a mut RecorderSink,
}

impl TraceSink for Tee<'_> {
    fn on_hold(&mut self, e: &HoldEvent) {
        self.pretty.on_hold(e);
        self.recorder.on_hold(e);
    }

    fn on_schedule(&mut self, e: &ScheduleEvent) {
        self.pretty.on_schedule(e);
        self.recorder.on_schedule(e);
    }

    fn on_timer_fire(&mut self, e: &TimerFireEvent) {
        self.pretty.on_timer_fire(e);
        self.recorder.on_timer_fire(e);
    }

    fn on_release(&mut self, e: &ReleaseEvent) {
        self.pretty.on_release(e);
        self.recorder.on_release(e);
    }

    fn on_bulk_release(&mut self, e: &BulkReleaseEvent) {
        self.pretty.on_bulk_release(e);
        self.recorder.on_bulk_release(e);
    }
}

struct InFlight {
    image: usize,
    cpu_time: HostTime,
    done_at: HostTime,
}

fn main() -> std::io::Result<()> {
    // -- sinks -------------------------------------------------------------
    let mut pretty = PrettyPrintSink::new(Box::new(std::io::stdout()));
    let mut recorder = RecorderSink::new();

    // -- limiter -----------------------------------------------------------
    let clock = Arc::new(SimClock::default());
    let timer = Arc::new(SimTimer::default());
    let limiter = FrameLimiter::new(
        PacingConfig::new().with_total_buffers(SWAPCHAIN_LEN),
        Arc::clone(&clock),
        FixedRefresh {
            clock: Arc::clone(&clock),
        },
        Arc::clone(&timer),
    );
    let mut swapchain: Vec<Arc<SwapchainImage>> = (0..SWAPCHAIN_LEN)
        .map(|_| {
            Arc::new(SwapchainImage {
                timestamp: TimestampLock::new(),
            })
        })
        .collect();

    // -- simulated loop ----------------------------------------------------
    clock.set(HostTime(1_000_000_000)); // start at 1s
    let mut costs = RenderCost(0x5eed);
    let mut in_flight: Option<InFlight> = None;
    let mut frames = 0_u64;
    let mut cycles = 0_u64;
    let mut renegotiated = false;

    {
        let mut tee = Tee {
            pretty: &mut pretty,
            recorder: &mut recorder,
        };
        let mut tracer = Tracer::new(&mut tee);

        while cycles < CYCLES {
            let now = clock.now();

            // The producer starts a frame as soon as an image is back.
            if in_flight.is_none()
                && let Some(image) = swapchain.iter().position(|i| Arc::strong_count(i) == 1)
            {
                in_flight = Some(InFlight {
                    image,
                    cpu_time: now,
                    done_at: now + costs.next(frames),
                });
            }

            let completes = in_flight.as_ref().map(|f| f.done_at);
            let fires_at = timer
                .pending()
                .map(|deadline| deadline.max(now) + Duration(TIMER_LATENCY_NS));
            match (completes, fires_at) {
                (Some(done), fires_at) if fires_at.is_none_or(|f| done < f) => {
                    let Some(frame) = in_flight.take() else {
                        break;
                    };
                    clock.set(done);
                    frames += 1;
                    let outcome = limiter.mark_frame(
                        Arc::clone(&swapchain[frame.image]),
                        frame.cpu_time,
                        frame.done_at,
                        true,
                    );
                    if let Some(hold) = outcome.hold {
                        tracer.hold(&HoldEvent::new(done, &hold));
                    }
                    if let Some(arm) = outcome.arm
                        && let Some(e) = ScheduleEvent::from_arm(done, ArmMode::Forced, &arm)
                    {
                        tracer.schedule(&e);
                    }
                }
                (_, Some(fires_at)) => {
                    clock.set(fires_at);
                    timer.expire();
                    let fire = limiter.on_timer_fire();
                    tracer.fire(fires_at, &fire);
                    if ReleaseEvent::from_fire(&fire).is_some() {
                        cycles += 1;
                    }
                }
                _ => break,
            }

            if !renegotiated && cycles == CYCLES / 2 {
                renegotiated = true;
                let at = clock.now();
                let total = SWAPCHAIN_LEN - 1;
                let released = limiter.set_total_buffers(total);
                tracer.bulk_release(&BulkReleaseEvent {
                    at,
                    released,
                    new_total: Some(total),
                });
                // The old images are gone; the producer keeps rendering into
                // a smaller swapchain.
                if let Some(frame) = &in_flight
                    && frame.image >= total as usize
                {
                    in_flight = None;
                }
                swapchain.truncate(total as usize);
            }
        }

        let _ = limiter.shutdown();
    }

    let PacingStats {
        releases,
        late_releases,
        over_capacity_holds,
        ignored_fires,
        ..
    } = limiter.stats();
    println!(
        "{cycles} cycles, {frames} frames: releases={releases} late={late_releases} \
         over_capacity={over_capacity_holds} ignored_fires={ignored_fires}"
    );

    // -- export Chrome trace -----------------------------------------------
    let path = "pacing_trace.json";
    let mut writer = BufWriter::new(File::create(path)?);
    latchpace_debug::chrome::export(recorder.as_bytes(), &mut writer)?;

    println!("Wrote {path} ({} bytes recorded)", recorder.as_bytes().len());
    Ok(())
}
