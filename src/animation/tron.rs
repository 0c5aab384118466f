// src/animation/tron.rs

//! Light-trail game for four players.
//!
//! Players start in the four corners and stand still until their pad picks
//! a direction. Every step each moving player advances one cell, leaving a
//! trail behind. Running into any trail wipes the field and stops everyone
//! where they are.

use super::{Animation, Direction, StepStatus};
use crate::color::Rgb;
use crate::input::PadState;
use crate::screen::Screen;
use log::debug;

pub const PLAYER_COLORS: [Rgb; 4] = [
    Rgb::new(255, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 0, 0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    pub pos: (usize, usize),
    pub dir: Direction,
}

pub struct Tron {
    width: usize,
    height: usize,
    /// Owner of the trail in each cell.
    trails: Vec<Option<usize>>,
    players: [Player; 4],
}

impl Tron {
    pub fn new(width: usize, height: usize) -> Self {
        let (right, bottom) = (width.saturating_sub(1), height.saturating_sub(1));
        let player = |pos| Player {
            pos,
            dir: Direction::None,
        };
        Tron {
            width,
            height,
            trails: vec![None; width * height],
            players: [
                player((0, 0)),
                player((right, 0)),
                player((0, bottom)),
                player((right, bottom)),
            ],
        }
    }

    pub fn players(&self) -> &[Player; 4] {
        &self.players
    }

    /// Owner of the trail at `(x, y)`.
    pub fn trail(&self, x: usize, y: usize) -> Option<usize> {
        self.trails.get(y * self.width + x).copied().flatten()
    }

    fn crash(&mut self) {
        self.trails.fill(None);
        for p in &mut self.players {
            p.dir = Direction::None;
        }
    }
}

impl Animation for Tron {
    fn name(&self) -> &'static str {
        "tron"
    }

    fn step(&mut self, pads: &[PadState]) -> StepStatus {
        for i in 0..self.players.len() {
            if let Some(pad) = pads.get(i) {
                let pressed = Direction::pressed(pad);
                if pressed != Direction::None {
                    self.players[i].dir = pressed;
                }
            }

            let p = self.players[i];
            if p.dir == Direction::None {
                continue;
            }
            let pos = p.dir.advance(p.pos, self.width, self.height);
            self.players[i].pos = pos;
            if self.trail(pos.0, pos.1).is_some() {
                debug!("Tron: player {} crashed at {:?}", i, pos);
                self.crash();
                return StepStatus::Running;
            }
        }

        for (i, p) in self.players.iter().enumerate() {
            self.trails[p.pos.1 * self.width + p.pos.0] = Some(i);
        }
        StepStatus::Running
    }

    fn paint(&self, screen: &mut Screen) {
        for y in 0..self.height {
            for x in 0..self.width {
                let color = self
                    .trail(x, y)
                    .map_or(Rgb::BLACK, |owner| PLAYER_COLORS[owner]);
                screen.set(x as i64, y as i64, color);
            }
        }
    }
}
