// src/scheduler.rs

//! Frame pacing for the delivery path.
//!
//! The scheduler runs in a dedicated background thread, reads the newest
//! published screen from the hand-off at the configured frame rate and
//! hands it to its sink. Producers can render at any rate; the wall is fed
//! at a steady one.
//!
//! Two pacing strategies:
//! - `FixedRate` sleeps whatever is left of the frame slot after sending.
//!   A slow send simply starts the next tick late, no catch-up.
//! - `Deadline` keeps an absolute `next_sync_at` phase-locked to the target
//!   rate and skips (drops) slots that have already passed.
//!
//! Send failures never stop the loop. Transient errors are logged, the
//! scheduler pauses for the backoff interval and resumes. A frame the sink
//! refuses outright (it does not fit the wall) is logged as an error and
//! skipped until a new one is published.

use crate::client::FrameSink;
use crate::handoff::ScreenHandoff;
use anyhow::{Context, Result};
use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_FPS: u32 = 50;
pub const MAX_FPS: u32 = 100;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Clamps a requested frame rate: anything outside 1–100 becomes 50.
pub fn normalize_fps(fps: i64) -> u32 {
    if fps <= 0 || fps > MAX_FPS as i64 {
        DEFAULT_FPS
    } else {
        fps as u32
    }
}

/// Length of one frame slot at `fps`.
pub fn frame_duration(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(fps.max(1)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    #[default]
    FixedRate,
    Deadline,
}

/// Where the next frame should go, as decided by [`DeadlinePacer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pace {
    /// How long to wait before sending.
    pub wait: Duration,
    /// Slots skipped because they were already in the past.
    pub dropped: u64,
}

/// Phase-locked slot clock.
#[derive(Debug, Clone)]
pub struct DeadlinePacer {
    frame: Duration,
    next_sync_at: Option<Instant>,
}

impl DeadlinePacer {
    pub fn new(frame: Duration) -> Self {
        DeadlinePacer {
            frame: frame.max(Duration::from_micros(1)),
            next_sync_at: None,
        }
    }

    /// Claims the next slot at or after `now`.
    pub fn advance(&mut self, now: Instant) -> Pace {
        let next = self.next_sync_at.get_or_insert(now);
        let mut dropped = 0;
        if *next < now {
            let frame_ns = self.frame.as_nanos();
            let behind_ns = (now - *next).as_nanos();
            dropped = u64::try_from(behind_ns.div_ceil(frame_ns)).unwrap_or(u64::MAX);
            // first slot at or after `now`, same phase
            let into_slot = (behind_ns % frame_ns) as u64;
            *next = if into_slot == 0 {
                now
            } else {
                now + (self.frame - Duration::from_nanos(into_slot))
            };
        }
        let wait = next.saturating_duration_since(now);
        *next += self.frame;
        Pace { wait, dropped }
    }

    /// Forgets the phase; the next `advance` starts a fresh slot.
    pub fn reset(&mut self) {
        self.next_sync_at = None;
    }
}

/// What a single scheduler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing has been published yet.
    Idle,
    Sent,
    /// The sink failed; the backoff has already been waited out.
    Failed,
    /// The sink refused the frame itself. It is not offered again; the
    /// next published frame is.
    Rejected,
}

/// Counters kept across ticks, reported in the logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub sent: u64,
    pub failed: u64,
    pub rejected: u64,
    pub dropped: u64,
}

pub struct FrameScheduler<S: FrameSink> {
    sink: S,
    handoff: Arc<ScreenHandoff>,
    frame: Duration,
    backoff: Duration,
    pacing: Pacing,
    pacer: DeadlinePacer,
    stats: SchedulerStats,
    /// Generation of the last frame the sink refused.
    rejected: Option<u64>,
}

impl<S: FrameSink> FrameScheduler<S> {
    pub fn new(sink: S, handoff: Arc<ScreenHandoff>, fps: i64) -> Self {
        let fps = normalize_fps(fps);
        let frame = frame_duration(fps);
        FrameScheduler {
            sink,
            handoff,
            frame,
            backoff: DEFAULT_BACKOFF,
            pacing: Pacing::default(),
            pacer: DeadlinePacer::new(frame),
            stats: SchedulerStats::default(),
            rejected: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Runs one tick, including its sleep.
    pub fn step(&mut self) -> Tick {
        match self.pacing {
            Pacing::FixedRate => self.step_fixed_rate(),
            Pacing::Deadline => self.step_deadline(),
        }
    }

    fn step_fixed_rate(&mut self) -> Tick {
        let slot_start = Instant::now();
        let tick = self.deliver();
        if tick != Tick::Failed {
            thread::sleep(self.frame.saturating_sub(slot_start.elapsed()));
        }
        tick
    }

    fn step_deadline(&mut self) -> Tick {
        let pace = self.pacer.advance(Instant::now());
        if pace.dropped > 0 {
            self.stats.dropped += pace.dropped;
            warn!("FrameScheduler: dropped {} frame(s)", pace.dropped);
        }
        thread::sleep(pace.wait);
        let tick = self.deliver();
        if tick == Tick::Failed {
            self.pacer.reset();
        }
        tick
    }

    /// Sends the newest frame, backing off on transient failures.
    fn deliver(&mut self) -> Tick {
        let generation = self.handoff.generation();
        if self.rejected == Some(generation) {
            return Tick::Idle;
        }
        let Some(screen) = self.handoff.latest() else {
            return Tick::Idle;
        };
        match self.sink.send(&screen) {
            Ok(()) => {
                self.stats.sent += 1;
                if self.stats.sent % 1000 == 0 {
                    debug!("FrameScheduler: {:?}", self.stats);
                }
                Tick::Sent
            }
            Err(e) if !e.is_transient() => {
                self.stats.rejected += 1;
                self.rejected = Some(generation);
                error!("FrameScheduler: frame refused, not retrying: {}", e);
                Tick::Rejected
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!(
                    "FrameScheduler: error while sending frame: {}; retrying in {:?}",
                    e, self.backoff
                );
                thread::sleep(self.backoff);
                Tick::Failed
            }
        }
    }

    /// Paces frames forever.
    pub fn run(mut self) -> ! {
        info!(
            "FrameScheduler: started ({:?} pacing, {:?} per frame)",
            self.pacing, self.frame
        );
        loop {
            self.step();
        }
    }
}

impl<S: FrameSink + 'static> FrameScheduler<S> {
    /// Spawns the scheduler on its own thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("frame-scheduler".to_string())
            .spawn(move || {
                self.run();
            })
            .context("Failed to spawn frame scheduler thread")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{WallError, WallResult};
    use crate::screen::{PanelLayout, Screen};
    use std::sync::Mutex;
    use test_log::test;

    /// Records send times; fails the first `fail_first` sends.
    struct MockSink {
        calls: Arc<Mutex<Vec<Instant>>>,
        fail_first: usize,
        delay: Duration,
    }

    impl MockSink {
        fn new(fail_first: usize, delay: Duration) -> (Self, Arc<Mutex<Vec<Instant>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                MockSink {
                    calls: calls.clone(),
                    fail_first,
                    delay,
                },
                calls,
            )
        }
    }

    impl FrameSink for MockSink {
        fn send(&mut self, _screen: &Screen) -> WallResult<()> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            let n = calls.len();
            drop(calls);
            thread::sleep(self.delay);
            if n <= self.fail_first {
                return Err(WallError::ShortWrite { sent: 0, expected: 1112 });
            }
            Ok(())
        }
    }

    /// Refuses every frame as if it did not fit the wall.
    struct RefusingSink {
        calls: Arc<Mutex<usize>>,
    }

    impl FrameSink for RefusingSink {
        fn send(&mut self, _screen: &Screen) -> WallResult<()> {
            *self.calls.lock().unwrap() += 1;
            Err(WallError::Config("frame is 18x18, wall is 54x36".into()))
        }
    }

    fn published() -> Arc<ScreenHandoff> {
        let h = Arc::new(ScreenHandoff::new());
        h.publish(&Screen::new(PanelLayout::default()));
        h
    }

    #[test]
    fn fps_outside_range_resets_to_default() {
        assert_eq!(normalize_fps(0), 50);
        assert_eq!(normalize_fps(-4), 50);
        assert_eq!(normalize_fps(101), 50);
        assert_eq!(normalize_fps(1), 1);
        assert_eq!(normalize_fps(100), 100);
        assert_eq!(normalize_fps(25), 25);
    }

    #[test]
    fn frame_duration_is_one_second_over_fps() {
        assert_eq!(frame_duration(50), Duration::from_millis(20));
        assert_eq!(frame_duration(1), Duration::from_secs(1));
        assert_eq!(frame_duration(100), Duration::from_millis(10));
    }

    #[test]
    fn idle_until_something_is_published() {
        let (sink, calls) = MockSink::new(0, Duration::ZERO);
        let h = Arc::new(ScreenHandoff::new());
        let mut s = FrameScheduler::new(sink, h.clone(), 100);
        assert_eq!(s.step(), Tick::Idle);
        assert!(calls.lock().unwrap().is_empty());

        h.publish(&Screen::new(PanelLayout::default()));
        assert_eq!(s.step(), Tick::Sent);
        // persistent read: the same frame is sent again
        assert_eq!(s.step(), Tick::Sent);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn failure_backs_off_before_the_next_attempt() {
        let backoff = Duration::from_millis(80);
        let (sink, calls) = MockSink::new(1, Duration::ZERO);
        let mut s = FrameScheduler::new(sink, published(), 100).with_backoff(backoff);

        assert_eq!(s.step(), Tick::Failed);
        assert_eq!(s.step(), Tick::Sent);

        let calls = calls.lock().unwrap();
        assert!(calls[1] - calls[0] >= backoff);
        assert_eq!(s.stats().failed, 1);
        assert_eq!(s.stats().sent, 1);
    }

    #[test]
    fn deadline_failure_also_backs_off() {
        let backoff = Duration::from_millis(50);
        let (sink, calls) = MockSink::new(1, Duration::ZERO);
        let mut s = FrameScheduler::new(sink, published(), 100)
            .with_backoff(backoff)
            .with_pacing(Pacing::Deadline);

        assert_eq!(s.step(), Tick::Failed);
        assert_eq!(s.step(), Tick::Sent);
        let calls = calls.lock().unwrap();
        assert!(calls[1] - calls[0] >= backoff);
    }

    #[test]
    fn successful_sends_are_paced_to_the_frame_rate() {
        let (sink, calls) = MockSink::new(0, Duration::ZERO);
        let mut s = FrameScheduler::new(sink, published(), 20);
        for _ in 0..3 {
            s.step();
        }
        let calls = calls.lock().unwrap();
        assert!(calls[1] - calls[0] >= Duration::from_millis(50));
        assert!(calls[2] - calls[1] >= Duration::from_millis(50));
    }

    #[test]
    fn slow_sends_do_not_accumulate_sleep_debt() {
        // each send takes three frame slots; the next tick must start right away
        let (sink, calls) = MockSink::new(0, Duration::from_millis(30));
        let mut s = FrameScheduler::new(sink, published(), 100);
        let start = Instant::now();
        for _ in 0..4 {
            s.step();
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(120));
        assert!(elapsed < Duration::from_millis(400), "took {:?}", elapsed);
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn refused_frame_is_not_retried() {
        let calls = Arc::new(Mutex::new(0));
        let sink = RefusingSink {
            calls: calls.clone(),
        };
        let h = published();
        let mut s = FrameScheduler::new(sink, h.clone(), 100).with_backoff(Duration::from_secs(5));

        let started = Instant::now();
        assert_eq!(s.step(), Tick::Rejected);
        assert_eq!(s.step(), Tick::Idle);
        assert_eq!(s.step(), Tick::Idle);
        assert!(started.elapsed() < Duration::from_secs(5), "backed off");
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(s.stats().rejected, 1);
        assert_eq!(s.stats().failed, 0);

        // a fresh frame gets its own chance
        h.publish(&Screen::new(PanelLayout::default()));
        assert_eq!(s.step(), Tick::Rejected);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn pacer_first_slot_is_immediate() {
        let mut p = DeadlinePacer::new(Duration::from_millis(10));
        let now = Instant::now();
        assert_eq!(
            p.advance(now),
            Pace {
                wait: Duration::ZERO,
                dropped: 0
            }
        );
    }

    #[test]
    fn pacer_waits_for_the_next_slot_when_early() {
        let mut p = DeadlinePacer::new(Duration::from_millis(10));
        let t0 = Instant::now();
        p.advance(t0);
        let pace = p.advance(t0 + Duration::from_millis(4));
        assert_eq!(pace.wait, Duration::from_millis(6));
        assert_eq!(pace.dropped, 0);
    }

    #[test]
    fn pacer_drops_slots_that_already_passed() {
        let mut p = DeadlinePacer::new(Duration::from_millis(10));
        let t0 = Instant::now();
        p.advance(t0);
        // next slot was t0+10; at t0+35 the slots at 10, 20, 30 are gone
        let pace = p.advance(t0 + Duration::from_millis(35));
        assert_eq!(pace.dropped, 3);
        assert_eq!(pace.wait, Duration::from_millis(5));
        // phase is preserved: following slot is t0+50
        let pace = p.advance(t0 + Duration::from_millis(41));
        assert_eq!(pace.wait, Duration::from_millis(9));
        assert_eq!(pace.dropped, 0);
    }

    #[test]
    fn pacer_counts_drops_beyond_u32_after_a_long_stall() {
        let mut p = DeadlinePacer::new(Duration::from_micros(1));
        let t0 = Instant::now();
        p.advance(t0);
        let pace = p.advance(t0 + Duration::from_secs(10_000));
        assert_eq!(pace.dropped, 9_999_999_999);
        assert_eq!(pace.wait, Duration::ZERO);
    }

    #[test]
    fn pacer_on_time_is_not_a_drop() {
        let mut p = DeadlinePacer::new(Duration::from_millis(10));
        let t0 = Instant::now();
        p.advance(t0);
        let pace = p.advance(t0 + Duration::from_millis(10));
        assert_eq!(pace.dropped, 0);
        assert_eq!(pace.wait, Duration::ZERO);
    }
}
