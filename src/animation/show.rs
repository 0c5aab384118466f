// src/animation/show.rs

//! Runs a playlist of animations on the wall.
//!
//! Each activity plays for its configured duration, or until start is
//! pressed on any pad. Every animation step is crossfaded from the previous
//! paint over `fps / steps_per_second` frames, each published to the
//! hand-off for the frame scheduler to pick up.

use super::{Animation, AnimationKind, LevelFeed, StepStatus};
use crate::handoff::{ScreenHandoff, Takeover};
use crate::input::PadSource;
use crate::scheduler::frame_duration;
use crate::screen::{blend, PanelLayout, Screen};
use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long a winding-down animation may keep the wall.
const WIND_DOWN_LIMIT: Duration = Duration::from_secs(10);

/// One entry of the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub kind: AnimationKind,
    /// How long the activity keeps the wall, in seconds.
    pub duration_secs: u64,
}

impl Activity {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    pub activities: Vec<Activity>,
    /// Animation steps per second; the remaining frames are crossfades.
    pub steps_per_second: u32,
}

impl Default for ShowConfig {
    fn default() -> Self {
        ShowConfig {
            activities: vec![
                Activity {
                    kind: AnimationKind::Life,
                    duration_secs: 120,
                },
                Activity {
                    kind: AnimationKind::Rainbow,
                    duration_secs: 60,
                },
                Activity {
                    kind: AnimationKind::Starfield,
                    duration_secs: 30,
                },
            ],
            steps_per_second: 10,
        }
    }
}

pub struct Show {
    layout: PanelLayout,
    handoff: Arc<ScreenHandoff>,
    pads: Box<dyn PadSource>,
    activities: Vec<Activity>,
    frame: Duration,
    blend_steps: usize,
    prev: Screen,
    next: Screen,
    start_held: bool,
    takeover: Option<Arc<Takeover>>,
    levels: Option<Arc<LevelFeed>>,
}

impl Show {
    pub fn new(
        layout: PanelLayout,
        handoff: Arc<ScreenHandoff>,
        pads: Box<dyn PadSource>,
        config: &ShowConfig,
        fps: u32,
    ) -> Self {
        let blend_steps = (fps / config.steps_per_second.max(1)).max(1) as usize;
        Show {
            layout,
            handoff,
            pads,
            activities: config.activities.clone(),
            frame: frame_duration(fps),
            blend_steps,
            prev: Screen::new(layout),
            next: Screen::new(layout),
            start_held: false,
            takeover: None,
            levels: None,
        }
    }

    /// Pauses publishing while `takeover` is claimed by another producer.
    pub fn with_takeover(mut self, takeover: Arc<Takeover>) -> Self {
        self.takeover = Some(takeover);
        self
    }

    /// Supplies the level graph activity.
    pub fn with_levels(mut self, feed: Arc<LevelFeed>) -> Self {
        self.levels = Some(feed);
        self
    }

    /// Frames published per animation step.
    pub fn blend_steps(&self) -> usize {
        self.blend_steps
    }

    /// Plays one activity to its end.
    ///
    /// Returns `ExitRequested` if start was pressed, `RoundEnded` if the
    /// animation finished by itself after its time was up, and `Running`
    /// if it was cut off.
    pub fn play(&mut self, activity: &Activity) -> StepStatus {
        let duration = activity.duration();
        let Some(mut anim) = activity.kind.build(self.layout, self.levels.as_ref()) else {
            warn!("Show: no level feed, skipping {:?}", activity.kind);
            return StepStatus::Running;
        };
        info!("Show: playing {} for {:?}", anim.name(), duration);

        let started = Instant::now();
        let mut winding_down = false;
        loop {
            match self.tick(anim.as_mut()) {
                StepStatus::ExitRequested => {
                    info!("Show: {} skipped", anim.name());
                    return StepStatus::ExitRequested;
                }
                StepStatus::RoundEnded if winding_down || started.elapsed() >= duration => {
                    return StepStatus::RoundEnded;
                }
                StepStatus::RoundEnded => {
                    debug!("Show: {} round ended, starting a new one", anim.name());
                    if let Some(fresh) = activity.kind.build(self.layout, self.levels.as_ref()) {
                        anim = fresh;
                    }
                }
                StepStatus::Running => {}
            }

            let elapsed = started.elapsed();
            if winding_down {
                if elapsed >= duration + WIND_DOWN_LIMIT {
                    warn!("Show: {} did not finish in time", anim.name());
                    return StepStatus::Running;
                }
            } else if elapsed >= duration {
                if !anim.wind_down() {
                    return StepStatus::Running;
                }
                winding_down = true;
            }
        }
    }

    /// Cycles through the playlist forever.
    pub fn run(mut self) -> ! {
        if self.levels.is_none() {
            let before = self.activities.len();
            self.activities.retain(|a| a.kind != AnimationKind::Levels);
            if self.activities.len() < before {
                warn!("Show: level graph configured without a level source, dropped");
            }
        }
        if self.activities.is_empty() {
            warn!("Show: no activities configured, showing a blank wall");
            self.handoff.publish(&self.prev);
            loop {
                thread::park();
            }
        }
        info!(
            "Show: {} activities, {} frames per step",
            self.activities.len(),
            self.blend_steps
        );
        let playlist = self.activities.clone();
        loop {
            for activity in &playlist {
                self.play(activity);
            }
        }
    }

    /// One animation step, crossfaded onto the wall.
    fn tick(&mut self, anim: &mut dyn Animation) -> StepStatus {
        if self.takeover.as_ref().is_some_and(|t| t.is_active()) {
            thread::sleep(self.frame);
            return StepStatus::Running;
        }

        let pads = self.pads.pads();
        let start = pads.iter().any(|p| p.start());
        let pressed = start && !self.start_held;
        self.start_held = start;
        if pressed {
            return StepStatus::ExitRequested;
        }

        let status = anim.step(&pads);
        anim.paint(&mut self.next);
        for frame in blend(&self.prev, &self.next, self.blend_steps) {
            let slot_start = Instant::now();
            self.handoff.publish_owned(frame);
            thread::sleep(self.frame.saturating_sub(slot_start.elapsed()));
        }
        std::mem::swap(&mut self.prev, &mut self.next);
        status
    }
}
