// src/animation/starfield.rs

//! Flight through a starfield: stars spawn at the centre and accelerate
//! outwards, getting more saturated and brighter as they approach the edge.

use super::{Animation, StepStatus};
use crate::color::Rgb;
use crate::input::PadState;
use crate::screen::Screen;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_STARS: usize = 400;
const SPAWN_PER_TICK: usize = 2;
const ACCELERATION: f64 = 1.05;

#[derive(Debug, Clone, Copy, Default)]
struct Star {
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
    alive: bool,
    hue: f64,
}

pub struct Starfield {
    stars: Vec<Star>,
    width: f64,
    height: f64,
    spawning: bool,
    rng: StdRng,
}

impl Starfield {
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_rng(width, height, StdRng::from_os_rng())
    }

    pub fn with_rng(width: usize, height: usize, rng: StdRng) -> Self {
        Starfield {
            stars: vec![Star::default(); MAX_STARS],
            width: width as f64,
            height: height as f64,
            spawning: true,
            rng,
        }
    }

    pub fn alive(&self) -> usize {
        self.stars.iter().filter(|s| s.alive).count()
    }

    fn spawn(&mut self) -> Star {
        Star {
            x: self.width / 2.0,
            y: self.height / 2.0,
            dx: self.rng.random::<f64>() * 2.0 - 0.9,
            dy: self.rng.random::<f64>() * 2.0 - 0.9,
            alive: true,
            hue: self.rng.random_range(0..360) as f64,
        }
    }

    fn color(&self, star: &Star) -> Rgb {
        let dist = (((star.x - self.width / 2.0) / self.width) / 2.0)
            .hypot(((star.y - self.height / 2.0) / self.height) / 2.0);
        let saturation = (dist * 3.0).min(1.0);
        let brightness = (0.1 + dist * 3.0).min(1.0);
        Rgb::from_hsv(star.hue, saturation, brightness)
    }
}

impl Animation for Starfield {
    fn name(&self) -> &'static str {
        "starfield"
    }

    fn step(&mut self, _pads: &[PadState]) -> StepStatus {
        let mut added = 0;
        for i in 0..self.stars.len() {
            if self.spawning && added < SPAWN_PER_TICK && !self.stars[i].alive {
                self.stars[i] = self.spawn();
                added += 1;
            }
            let (w, h) = (self.width, self.height);
            let star = &mut self.stars[i];
            if !star.alive {
                continue;
            }
            star.x += star.dx;
            star.y += star.dy;
            star.dx *= ACCELERATION;
            star.dy *= ACCELERATION;
            if star.x < 0.0 || star.y < 0.0 || star.x >= w || star.y >= h {
                star.alive = false;
            }
        }

        if !self.spawning && self.alive() == 0 {
            StepStatus::RoundEnded
        } else {
            StepStatus::Running
        }
    }

    fn paint(&self, screen: &mut Screen) {
        screen.clear();
        for star in self.stars.iter().filter(|s| s.alive) {
            screen.set(star.x as i64, star.y as i64, self.color(star));
        }
    }

    fn wind_down(&mut self) -> bool {
        self.spawning = false;
        true
    }
}
