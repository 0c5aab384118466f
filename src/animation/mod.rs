// src/animation/mod.rs

//! Frame producers for the wall.
//!
//! An animation advances its own state in `step`, reacting to the pads, and
//! renders into a screen buffer in `paint`. Neither call touches the
//! network; the `Show` runner publishes painted frames to the hand-off.

pub mod levels;
pub mod life;
pub mod rainbow;
pub mod show;
pub mod snake;
pub mod starfield;
pub mod tron;

use crate::input::PadState;
use crate::screen::{PanelLayout, Screen};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use levels::{LevelConfig, LevelFeed, LevelGraph};
pub use life::Life;
pub use rainbow::Rainbow;
pub use show::{Activity, Show, ShowConfig};
pub use snake::Snake;
pub use starfield::Starfield;
pub use tron::Tron;

/// Outcome of advancing an animation by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    /// The current round is over (e.g. every cell died); a fresh instance
    /// may be started.
    RoundEnded,
    /// The animation wants to hand the wall over to the next one.
    ExitRequested,
}

pub trait Animation: Send {
    fn name(&self) -> &'static str;

    /// Advances one tick.
    fn step(&mut self, pads: &[PadState]) -> StepStatus;

    /// Renders the current state. Every pixel of the wall is written.
    fn paint(&self, screen: &mut Screen);

    /// Asks the animation to wrap up. Returns `true` if it will report
    /// `RoundEnded` on its own shortly; otherwise the caller cuts it off.
    fn wind_down(&mut self) -> bool {
        false
    }
}

/// Heading of a player in the pad-driven games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    None,
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// The direction pressed on `pad`. Later checks win, so right beats
    /// left beats down beats up when several are held.
    pub fn pressed(pad: &PadState) -> Direction {
        let mut dir = Direction::None;
        if pad.up() {
            dir = Direction::Up;
        }
        if pad.down() {
            dir = Direction::Down;
        }
        if pad.left() {
            dir = Direction::Left;
        }
        if pad.right() {
            dir = Direction::Right;
        }
        dir
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::None => Direction::None,
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    /// Moves `(x, y)` one cell, wrapping around a `width`×`height` torus.
    pub fn advance(self, (x, y): (usize, usize), width: usize, height: usize) -> (usize, usize) {
        let (dx, dy) = match self {
            Direction::None => (0, 0),
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        };
        (
            (x as i64 + dx).rem_euclid(width as i64) as usize,
            (y as i64 + dy).rem_euclid(height as i64) as usize,
        )
    }
}

/// Animations the show can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Life,
    Rainbow,
    Starfield,
    Tron,
    Snake,
    /// Scrolling audio level graph; needs a running `LevelFeed`.
    Levels,
}

impl AnimationKind {
    /// Creates a fresh instance sized for `layout`. `None` for the level
    /// graph when no feed is running.
    pub fn build(
        self,
        layout: PanelLayout,
        levels: Option<&Arc<LevelFeed>>,
    ) -> Option<Box<dyn Animation>> {
        let (w, h) = (layout.width(), layout.height());
        let anim: Box<dyn Animation> = match self {
            AnimationKind::Life => Box::new(Life::new(w, h)),
            AnimationKind::Rainbow => Box::new(Rainbow::new(w, h)),
            AnimationKind::Starfield => Box::new(Starfield::new(w, h)),
            AnimationKind::Tron => Box::new(Tron::new(w, h)),
            AnimationKind::Snake => Box::new(Snake::new(w, h)),
            AnimationKind::Levels => Box::new(LevelGraph::new(levels?.clone())),
        };
        Some(anim)
    }
}
