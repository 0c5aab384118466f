// src/animation/snake.rs

//! Two-player snake.
//!
//! Both snakes start heading the same random direction and grow by eating
//! fruit. A snake cannot reverse onto itself. Running into any snake body,
//! or the two heads meeting, ends the round with a penalty. A player whose
//! pad stays untouched for the idle limit drops out; once both have dropped
//! out the game asks to hand over the wall.

use super::{Animation, Direction, StepStatus};
use crate::color::Rgb;
use crate::input::PadState;
use crate::screen::Screen;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const START_LENGTH: usize = 10;
pub const GROWTH: usize = 10;
pub const FRUIT_SCORE: i32 = 10;
pub const CRASH_PENALTY: i32 = 50;
pub const IDLE_LIMIT: Duration = Duration::from_secs(30);
const INITIAL_FRUIT: usize = 3;

pub const PLAYER_COLORS: [Rgb; 2] = [Rgb::new(255, 255, 0), Rgb::new(255, 0, 255)];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Cell {
    snake: bool,
    fruit: Option<Rgb>,
}

#[derive(Debug, Clone)]
pub struct Player {
    /// Head first; each segment keeps the color it was painted with.
    pub body: VecDeque<((usize, usize), Rgb)>,
    pub color: Rgb,
    pub length: usize,
    pub score: i32,
    pub dir: Direction,
    /// `None` once the player has dropped out.
    idle_until: Option<Instant>,
}

impl Player {
    pub fn head(&self) -> (usize, usize) {
        self.body.front().map_or((0, 0), |&(pos, _)| pos)
    }

    pub fn is_active(&self) -> bool {
        self.idle_until.is_some()
    }
}

pub struct Snake {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    players: Vec<Player>,
    idle_limit: Duration,
    rng: StdRng,
}

impl Snake {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_rng(width, height, StdRng::from_os_rng())
    }

    pub fn with_rng(width: usize, height: usize, mut rng: StdRng) -> Self {
        let dir = match rng.random_range(0..4) {
            0 => Direction::Up,
            1 => Direction::Left,
            2 => Direction::Right,
            _ => Direction::Down,
        };
        let now = Instant::now();
        let player = |pos, color| Player {
            body: VecDeque::from([(pos, color)]),
            color,
            length: START_LENGTH,
            score: 0,
            dir,
            idle_until: Some(now + IDLE_LIMIT),
        };
        let mut snake = Snake {
            width,
            height,
            cells: vec![Cell::default(); width * height],
            players: vec![
                player((width / 2, height / 4), PLAYER_COLORS[0]),
                player((width / 2, height - height / 4), PLAYER_COLORS[1]),
            ],
            idle_limit: IDLE_LIMIT,
            rng,
        };
        for i in 0..snake.players.len() {
            let idx = snake.index(snake.players[i].head());
            snake.cells[idx].snake = true;
        }
        for _ in 0..INITIAL_FRUIT {
            snake.spawn_fruit();
        }
        snake
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    fn index(&self, (x, y): (usize, usize)) -> usize {
        y * self.width + x
    }

    pub fn fruit_at(&self, pos: (usize, usize)) -> Option<Rgb> {
        self.cells.get(self.index(pos)).and_then(|c| c.fruit)
    }

    /// Puts a fruit on a random free cell, if there is one.
    pub fn spawn_fruit(&mut self) {
        let free: Vec<usize> = (0..self.cells.len())
            .filter(|&i| !self.cells[i].snake && self.cells[i].fruit.is_none())
            .collect();
        if free.is_empty() {
            return;
        }
        let i = free[self.rng.random_range(0..free.len())];
        let hue = self.rng.random::<f64>() * 360.0;
        self.cells[i].fruit = Some(Rgb::from_hsv(hue, 0.8, 0.5));
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    fn steer(&mut self, i: usize, pad: Option<&PadState>, now: Instant) -> bool {
        let p = &mut self.players[i];
        let pressed = pad.map_or(Direction::None, Direction::pressed);
        if pressed != Direction::None && pressed != p.dir.opposite() {
            p.dir = pressed;
            p.idle_until = Some(now + self.idle_limit);
            return true;
        }
        if p.idle_until.is_some_and(|t| t <= now) {
            info!("Snake: player {} idle, dropping out", i);
            p.idle_until = None;
            let body: Vec<_> = p.body.drain(..).map(|(pos, _)| pos).collect();
            for pos in body {
                let idx = self.index(pos);
                self.cells[idx].snake = false;
            }
            return false;
        }
        true
    }

    fn crash(&mut self, players: &[usize]) -> StepStatus {
        for &i in players {
            self.players[i].score -= CRASH_PENALTY;
            self.players[i].dir = Direction::None;
        }
        debug!("Snake: crash, scores {:?}", self.scores());
        self.clear();
        StepStatus::RoundEnded
    }

    pub fn scores(&self) -> Vec<i32> {
        self.players.iter().map(|p| p.score).collect()
    }
}

impl Animation for Snake {
    fn name(&self) -> &'static str {
        "snake"
    }

    fn step(&mut self, pads: &[PadState]) -> StepStatus {
        let now = Instant::now();
        let mut any_active = false;
        for i in 0..self.players.len() {
            if !self.players[i].is_active() || !self.steer(i, pads.get(i), now) {
                continue;
            }
            any_active = true;

            let (width, height) = (self.width, self.height);
            let p = &mut self.players[i];
            let head = p.dir.advance(p.head(), width, height);
            p.body.push_front((head, p.color));
            if p.body.len() > p.length {
                if let Some((tail, _)) = p.body.pop_back() {
                    let idx = self.index(tail);
                    self.cells[idx].snake = false;
                }
            }
        }
        if !any_active {
            info!("Snake: everyone left, final scores {:?}", self.scores());
            return StepStatus::ExitRequested;
        }

        let active: Vec<usize> = (0..self.players.len())
            .filter(|&i| self.players[i].is_active())
            .collect();
        for (n, &i) in active.iter().enumerate() {
            for &j in &active[n + 1..] {
                if self.players[i].head() == self.players[j].head() {
                    return self.crash(&[i, j]);
                }
            }
        }

        for i in active {
            let head = self.players[i].head();
            let idx = self.index(head);
            if self.cells[idx].snake {
                return self.crash(&[i]);
            }
            self.cells[idx].snake = true;
            if let Some(fruit) = self.cells[idx].fruit.take() {
                let p = &mut self.players[i];
                p.color = fruit;
                if let Some(segment) = p.body.front_mut() {
                    segment.1 = fruit;
                }
                p.length += GROWTH;
                p.score += FRUIT_SCORE;
                self.spawn_fruit();
            }
        }
        StepStatus::Running
    }

    fn paint(&self, screen: &mut Screen) {
        for y in 0..self.height {
            for x in 0..self.width {
                let color = self.cells[self.index((x, y))].fruit.unwrap_or(Rgb::BLACK);
                screen.set(x as i64, y as i64, color);
            }
        }
        for p in &self.players {
            for &((x, y), color) in &p.body {
                screen.set(x as i64, y as i64, color);
            }
        }
    }
}
