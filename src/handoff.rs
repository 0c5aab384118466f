// src/handoff.rs

//! Single-slot mailbox between frame producers and the delivery consumer.
//!
//! Producers publish finished screens without ever blocking. The slot holds
//! at most one frame; publishing overwrites whatever was there, so a slow
//! consumer sees the newest frame and never a backlog.
//!
//! Two read disciplines share the slot:
//! - `latest()` is a persistent read for the wall scheduler: it returns the
//!   last published frame every time, so there is always something to send.
//! - `take()` / `wait_next()` are exactly-once reads for consumers that must
//!   not silently repeat a frame (terminal preview, the step-gated level
//!   graph).

use crate::screen::Screen;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Slot {
    frame: Option<Screen>,
    /// Number of frames published so far.
    generation: u64,
    /// Generation last handed out by an exactly-once read.
    taken: u64,
}

/// Shared hand-off slot. Wrap in an `Arc` to share between threads.
#[derive(Default)]
pub struct ScreenHandoff {
    slot: Mutex<Slot>,
    published: Condvar,
}

impl ScreenHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        // A producer panicking mid-publish leaves a complete frame behind,
        // so a poisoned slot is still usable.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a private copy of `screen`, replacing any unread frame.
    pub fn publish(&self, screen: &Screen) {
        self.publish_owned(screen.copy());
    }

    /// Stores `screen`, replacing any unread frame. Ownership moves into the
    /// slot, so the producer cannot mutate it afterwards.
    pub fn publish_owned(&self, screen: Screen) {
        let mut slot = self.lock();
        slot.frame = Some(screen);
        slot.generation += 1;
        drop(slot);
        self.published.notify_all();
    }

    /// Number of frames published so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Persistent read: a copy of the most recently published frame, or
    /// `None` if nothing was ever published.
    pub fn latest(&self) -> Option<Screen> {
        self.lock().frame.clone()
    }

    /// Exactly-once read without blocking: the newest frame if it has not
    /// been taken yet.
    pub fn take(&self) -> Option<Screen> {
        let mut slot = self.lock();
        Self::take_locked(&mut slot)
    }

    fn take_locked(slot: &mut Slot) -> Option<Screen> {
        if slot.taken == slot.generation {
            return None;
        }
        slot.taken = slot.generation;
        slot.frame.clone()
    }

    /// Exactly-once read that blocks until a frame newer than the last
    /// taken one is published, or `timeout` elapses.
    pub fn wait_next(&self, timeout: Duration) -> Option<Screen> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(frame) = Self::take_locked(&mut slot) {
                return Some(frame);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            slot = self
                .published
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Lets one producer (an uploaded image) claim the wall for a while so the
/// regular animation producer holds back.
#[derive(Debug, Default)]
pub struct Takeover {
    until: Mutex<Option<Instant>>,
}

impl Takeover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the wall for `duration` from now. A later claim replaces an
    /// earlier one.
    pub fn claim(&self, duration: Duration) {
        *self.until.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now() + duration);
    }

    pub fn is_active(&self) -> bool {
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|until| Instant::now() < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::screen::PanelLayout;
    use std::sync::Arc;
    use std::thread;
    use test_log::test;

    fn frame(tag: u8) -> Screen {
        let mut s = Screen::new(PanelLayout::default());
        s.set(0, 0, Rgb::new(tag, tag, tag));
        s
    }

    fn tag(s: &Screen) -> u8 {
        s.get(0, 0).unwrap().r
    }

    #[test]
    fn empty_slot_yields_nothing() {
        let h = ScreenHandoff::new();
        assert!(h.latest().is_none());
        assert!(h.take().is_none());
        assert!(h.wait_next(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn later_publish_overwrites_unread_frame() {
        let h = ScreenHandoff::new();
        h.publish(&frame(1));
        h.publish(&frame(2));
        assert_eq!(tag(&h.take().unwrap()), 2);
        assert!(h.take().is_none(), "first frame must never be observed");
        assert_eq!(h.generation(), 2);
    }

    #[test]
    fn latest_keeps_returning_the_last_frame() {
        let h = ScreenHandoff::new();
        h.publish(&frame(7));
        assert_eq!(tag(&h.latest().unwrap()), 7);
        assert_eq!(tag(&h.latest().unwrap()), 7);
        h.publish(&frame(8));
        assert_eq!(tag(&h.latest().unwrap()), 8);
    }

    #[test]
    fn publish_copies_the_producer_buffer() {
        let h = ScreenHandoff::new();
        let mut s = frame(3);
        h.publish(&s);
        s.set(0, 0, Rgb::WHITE);
        assert_eq!(tag(&h.latest().unwrap()), 3);
    }

    #[test]
    fn wait_next_wakes_on_publish_from_another_thread() {
        let h = Arc::new(ScreenHandoff::new());
        let producer = {
            let h = h.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                h.publish(&frame(5));
            })
        };
        let got = h.wait_next(Duration::from_secs(5)).expect("frame published");
        assert_eq!(tag(&got), 5);
        producer.join().unwrap();
    }

    #[test]
    fn persistent_and_exactly_once_reads_do_not_interfere() {
        let h = ScreenHandoff::new();
        h.publish(&frame(1));
        assert!(h.latest().is_some());
        assert_eq!(tag(&h.take().unwrap()), 1);
        assert!(h.latest().is_some());
        assert!(h.take().is_none());
    }

    #[test]
    fn concurrent_producers_never_block() {
        let h = Arc::new(ScreenHandoff::new());
        let producers: Vec<_> = (0..4u8)
            .map(|p| {
                let h = h.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        h.publish(&frame(p));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(h.generation(), 1000);
        assert!(tag(&h.latest().unwrap()) < 4);
    }

    #[test]
    fn takeover_expires() {
        let t = Takeover::new();
        assert!(!t.is_active());
        t.claim(Duration::from_millis(30));
        assert!(t.is_active());
        thread::sleep(Duration::from_millis(50));
        assert!(!t.is_active());
    }
}
