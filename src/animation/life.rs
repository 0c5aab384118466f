// src/animation/life.rs

//! Conway's Game of Life on a torus, with colored cells.
//!
//! Each living cell carries a hue. A cell that is born or survives takes the
//! mean hue of its living neighbours (and of itself, if it was alive),
//! shifted by 2°, so colonies slowly drift around the color wheel and mix
//! where they meet.

use super::{Animation, StepStatus};
use crate::color::Rgb;
use crate::input::PadState;
use crate::screen::Screen;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const INITIAL_SPACESHIPS: usize = 15;
const HUE_SHIFT: f32 = 2.0;
const SATURATION: f64 = 0.7;
const VALUE: f64 = 0.8;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cell {
    pub alive: bool,
    pub hue: f32,
}

/// A toroidal grid of cells.
#[derive(Debug, Clone)]
pub struct Field {
    cells: Vec<Cell>,
    width: usize,
    height: usize,
}

impl Field {
    pub fn new(width: usize, height: usize) -> Self {
        Field {
            cells: vec![Cell::default(); width * height],
            width,
            height,
        }
    }

    fn index(&self, x: i64, y: i64) -> usize {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        y * self.width + x
    }

    /// The cell at `(x, y)`, wrapping around the edges.
    pub fn cell(&self, x: i64, y: i64) -> Cell {
        self.cells[self.index(x, y)]
    }

    pub fn set(&mut self, x: i64, y: i64, cell: Cell) {
        let i = self.index(x, y);
        self.cells[i] = cell;
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|c| c.alive).count()
    }

    /// State of `(x, y)` one generation later.
    pub fn next(&self, x: i64, y: i64) -> Cell {
        let mut alive = 0;
        let mut hue = 0.0f32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let n = self.cell(x + dx, y + dy);
                if n.alive {
                    alive += 1;
                    hue += n.hue;
                }
            }
        }

        let current = self.cell(x, y);
        if alive == 3 || (alive == 2 && current.alive) {
            if current.alive {
                alive += 1;
                hue += current.hue;
            }
            Cell {
                alive: true,
                hue: (hue / alive as f32 + HUE_SHIFT).rem_euclid(360.0),
            }
        } else {
            Cell::default()
        }
    }
}

pub struct Life {
    current: Field,
    scratch: Field,
    rng: StdRng,
}

impl Life {
    /// A field seeded with random spaceships.
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_rng(width, height, StdRng::from_os_rng())
    }

    pub fn with_rng(width: usize, height: usize, rng: StdRng) -> Self {
        let mut life = Self::empty(width, height, rng);
        for _ in 0..INITIAL_SPACESHIPS {
            life.add_random_spaceship();
        }
        life
    }

    /// A field with no living cells.
    pub fn empty(width: usize, height: usize, rng: StdRng) -> Self {
        Life {
            current: Field::new(width, height),
            scratch: Field::new(width, height),
            rng,
        }
    }

    pub fn field(&self) -> &Field {
        &self.current
    }

    pub fn field_mut(&mut self) -> &mut Field {
        &mut self.current
    }

    /// Advances one generation.
    pub fn advance(&mut self) {
        for y in 0..self.current.height as i64 {
            for x in 0..self.current.width as i64 {
                let next = self.current.next(x, y);
                self.scratch.set(x, y, next);
            }
        }
        std::mem::swap(&mut self.current, &mut self.scratch);
    }

    /// Drops a glider, an inverted glider or a small fish at a random
    /// position, in a random color.
    pub fn add_random_spaceship(&mut self) {
        let x = self.rng.random_range(0..self.current.width as i64);
        let y = self.rng.random_range(0..self.current.height as i64);
        let cell = Cell {
            alive: true,
            hue: self.rng.random::<f32>() * 360.0,
        };
        let shape: &[(i64, i64)] = match self.rng.random_range(0..3) {
            0 => &GLIDER,
            1 => &GLIDER_INVERTED,
            _ => &SMALL_FISH,
        };
        for (dx, dy) in shape {
            self.current.set(x + dx, y + dy, cell);
        }
    }
}

const GLIDER: [(i64, i64); 5] = [(0, 0), (1, 0), (2, 0), (2, 1), (1, 2)];
const GLIDER_INVERTED: [(i64, i64); 5] = [(0, 0), (1, 0), (2, 0), (0, -1), (1, -2)];
const SMALL_FISH: [(i64, i64); 9] = [
    (0, 0),
    (1, 0),
    (2, 0),
    (3, 0),
    (4, 1),
    (4, 3),
    (0, 1),
    (0, 2),
    (1, 3),
];

impl Animation for Life {
    fn name(&self) -> &'static str {
        "life"
    }

    /// Any pressed face button drops in another spaceship.
    fn step(&mut self, pads: &[PadState]) -> StepStatus {
        if pads
            .iter()
            .any(|p| p.north() || p.east() || p.south() || p.west())
        {
            self.add_random_spaceship();
        }
        self.advance();
        if self.current.population() == 0 {
            StepStatus::RoundEnded
        } else {
            StepStatus::Running
        }
    }

    fn paint(&self, screen: &mut Screen) {
        for y in 0..screen.height() as i64 {
            for x in 0..screen.width() as i64 {
                let c = self.current.cell(x, y);
                if c.alive {
                    screen.set(x, y, Rgb::from_hsv(c.hue as f64, SATURATION, VALUE));
                } else {
                    screen.set(x, y, Rgb::BLACK);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Buttons;
    use crate::screen::PanelLayout;

    fn empty(w: usize, h: usize) -> Life {
        Life::empty(w, h, StdRng::seed_from_u64(7))
    }

    fn alive(hue: f32) -> Cell {
        Cell { alive: true, hue }
    }

    #[test]
    fn blinker_oscillates() {
        let mut life = empty(5, 5);
        for x in 1..=3 {
            life.field_mut().set(x, 2, alive(0.0));
        }
        life.advance();
        let f = life.field();
        assert!(f.cell(2, 1).alive && f.cell(2, 2).alive && f.cell(2, 3).alive);
        assert!(!f.cell(1, 2).alive && !f.cell(3, 2).alive);
        life.advance();
        assert!(life.field().cell(1, 2).alive && life.field().cell(3, 2).alive);
    }

    #[test]
    fn field_wraps_toroidally() {
        let mut f = Field::new(4, 3);
        f.set(-1, -1, alive(10.0));
        assert!(f.cell(3, 2).alive);
        assert!(f.cell(7, 5).alive);
    }

    #[test]
    fn birth_takes_mean_neighbour_hue_plus_shift() {
        let mut f = Field::new(5, 5);
        f.set(1, 1, alive(10.0));
        f.set(2, 1, alive(20.0));
        f.set(3, 1, alive(30.0));
        let born = f.next(2, 2);
        assert!(born.alive);
        assert!((born.hue - 22.0).abs() < 1e-4);
    }

    #[test]
    fn survivor_includes_its_own_hue() {
        let mut f = Field::new(5, 5);
        f.set(1, 2, alive(0.0));
        f.set(2, 2, alive(90.0));
        f.set(3, 2, alive(0.0));
        let survivor = f.next(2, 2);
        assert!(survivor.alive);
        assert!((survivor.hue - 32.0).abs() < 1e-4);
    }

    #[test]
    fn hue_wraps_past_360() {
        let mut f = Field::new(5, 5);
        for x in 1..=3 {
            f.set(x, 1, alive(359.0));
        }
        let born = f.next(2, 2);
        assert!((born.hue - 1.0).abs() < 1e-3);
    }

    #[test]
    fn lonely_and_crowded_cells_die() {
        let mut f = Field::new(5, 5);
        f.set(2, 2, alive(0.0));
        assert!(!f.next(2, 2).alive);
        for (x, y) in [(1, 1), (2, 1), (3, 1), (1, 2), (3, 2)] {
            f.set(x, y, alive(0.0));
        }
        assert!(!f.next(2, 2).alive);
    }

    #[test]
    fn starts_with_spaceships() {
        let life = Life::with_rng(54, 36, StdRng::seed_from_u64(1));
        assert!(life.field().population() >= 5);
    }

    #[test]
    fn round_ends_when_everything_died() {
        let mut life = empty(6, 6);
        life.field_mut().set(0, 0, alive(0.0));
        assert_eq!(life.step(&[]), StepStatus::RoundEnded);
    }

    #[test]
    fn face_button_adds_a_spaceship() {
        let mut life = empty(20, 20);
        let pad = PadState::with_buttons(Buttons::CROSS);
        // every spaceship has at least one cell that survives its first step
        assert_eq!(life.step(&[pad]), StepStatus::Running);
        assert!(life.field().population() > 0);
    }

    #[test]
    fn paint_colors_living_cells() {
        let mut life = empty(36, 18);
        life.field_mut().set(4, 5, alive(0.0));
        let mut screen = Screen::new(PanelLayout::new(2, 1));
        life.paint(&mut screen);
        assert_eq!(screen.get(4, 5), Some(Rgb::from_hsv(0.0, 0.7, 0.8)));
        assert_eq!(screen.get(5, 5), Some(Rgb::BLACK));
    }
}
