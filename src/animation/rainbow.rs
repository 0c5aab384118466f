// src/animation/rainbow.rs

//! Slowly drifting rainbow: hue runs down the rows, saturation and value
//! follow sine and cosine waves across the wall.

use super::{Animation, StepStatus};
use crate::color::Rgb;
use crate::input::PadState;
use crate::screen::Screen;
use rand::Rng;

pub struct Rainbow {
    width: f64,
    height: f64,
    phase_x: f64,
    phase_y: f64,
    hue: f64,
}

impl Rainbow {
    pub fn new(width: usize, height: usize) -> Self {
        let mut rng = rand::rng();
        Rainbow {
            width: width as f64,
            height: height as f64,
            phase_x: rng.random::<f64>() * 100.0,
            phase_y: rng.random::<f64>() * 50.0,
            hue: rng.random::<f64>() * 360.0,
        }
    }

    fn color_at(&self, x: f64, y: f64) -> Rgb {
        let hue = (y * 1.5 + self.hue).rem_euclid(360.0);
        let saturation = 0.2 + 0.8 * (((self.phase_x + x) / self.width * 3.0).sin() / 2.0 + 0.5);
        let value = 0.1 + 0.9 * (((self.phase_y + y) / self.height * 3.0).cos() / 2.0 + 0.5);
        Rgb::from_hsv(hue, saturation, value)
    }
}

impl Animation for Rainbow {
    fn name(&self) -> &'static str {
        "rainbow"
    }

    fn step(&mut self, _pads: &[PadState]) -> StepStatus {
        self.phase_x += 0.8;
        self.phase_y += 0.5;
        self.hue = (self.hue + 2.0).rem_euclid(360.0);
        StepStatus::Running
    }

    fn paint(&self, screen: &mut Screen) {
        for y in 0..screen.height() {
            for x in 0..screen.width() {
                screen.set(x as i64, y as i64, self.color_at(x as f64, y as f64));
            }
        }
    }
}
