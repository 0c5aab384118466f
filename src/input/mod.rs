// src/input/mod.rs

//! Pad input for the games and animations.
//!
//! Every input device is reduced to the same immutable snapshot, `PadState`,
//! which exposes the union of all capabilities (directions, face buttons,
//! shoulders, start/select, two analog sticks). Devices without a given
//! capability simply never report it.
//!
//! Sources are polled, never awaited: `PadSource::pads` returns the current
//! state of up to four controllers immediately.

#[cfg(feature = "gamepad")]
pub mod gamepad;
pub mod keyboard;
pub mod serial;

use anyhow::{Context, Result};
use bitflags::bitflags;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(feature = "gamepad")]
pub use gamepad::GamepadPads;
pub use keyboard::KeyboardPads;
pub use serial::SerialPads;

/// Number of controllers a source reports.
pub const PAD_COUNT: usize = 4;

bitflags! {
    /// Digital buttons of a pad.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Buttons: u16 {
        const UP = 1 << 0;
        const RIGHT = 1 << 1;
        const DOWN = 1 << 2;
        const LEFT = 1 << 3;
        const SELECT = 1 << 4;
        const START = 1 << 5;
        const TRIANGLE = 1 << 6; // north
        const CIRCLE = 1 << 7; // east
        const CROSS = 1 << 8; // south
        const SQUARE = 1 << 9; // west
        const L1 = 1 << 10;
        const L2 = 1 << 11;
        const R1 = 1 << 12;
        const R2 = 1 << 13;
    }
}

/// Snapshot of one controller.
///
/// Sticks are `(x, y)` in `[-1, 1]`, with positive y pointing down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PadState {
    pub buttons: Buttons,
    pub left_stick: (f32, f32),
    pub right_stick: (f32, f32),
}

impl PadState {
    pub fn with_buttons(buttons: Buttons) -> Self {
        PadState {
            buttons,
            ..Default::default()
        }
    }

    pub fn up(&self) -> bool {
        self.buttons.contains(Buttons::UP)
    }

    pub fn down(&self) -> bool {
        self.buttons.contains(Buttons::DOWN)
    }

    pub fn left(&self) -> bool {
        self.buttons.contains(Buttons::LEFT)
    }

    pub fn right(&self) -> bool {
        self.buttons.contains(Buttons::RIGHT)
    }

    pub fn start(&self) -> bool {
        self.buttons.contains(Buttons::START)
    }

    pub fn select(&self) -> bool {
        self.buttons.contains(Buttons::SELECT)
    }

    pub fn north(&self) -> bool {
        self.buttons.contains(Buttons::TRIANGLE)
    }

    pub fn east(&self) -> bool {
        self.buttons.contains(Buttons::CIRCLE)
    }

    pub fn south(&self) -> bool {
        self.buttons.contains(Buttons::CROSS)
    }

    pub fn west(&self) -> bool {
        self.buttons.contains(Buttons::SQUARE)
    }

    /// Whether any button is held or any stick is off-centre.
    pub fn is_active(&self) -> bool {
        !self.buttons.is_empty()
            || self.left_stick != (0.0, 0.0)
            || self.right_stick != (0.0, 0.0)
    }
}

/// Short human-readable form: `u r d l t c x q` plus stick positions.
impl std::fmt::Display for PadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Buttons::UP, "u"),
            (Buttons::RIGHT, "r"),
            (Buttons::DOWN, "d"),
            (Buttons::LEFT, "l"),
            (Buttons::TRIANGLE, "t"),
            (Buttons::CIRCLE, "c"),
            (Buttons::CROSS, "x"),
            (Buttons::SQUARE, "q"),
        ];
        for (button, name) in names {
            if self.buttons.contains(button) {
                write!(f, "{} ", name)?;
            }
        }
        let (lx, ly) = self.left_stick;
        if (lx, ly) != (0.0, 0.0) {
            write!(f, "L {:.2} {:.2} ", lx, ly)?;
        }
        let (rx, ry) = self.right_stick;
        if (rx, ry) != (0.0, 0.0) {
            write!(f, "R {:.2} {:.2} ", rx, ry)?;
        }
        Ok(())
    }
}

/// Anything that reports controller state.
pub trait PadSource: Send {
    /// Current state of all controllers. Never blocks.
    fn pads(&self) -> [PadState; PAD_COUNT];
}

/// Source used when no input is configured: nothing is ever pressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPads;

impl PadSource for NullPads {
    fn pads(&self) -> [PadState; PAD_COUNT] {
        [PadState::default(); PAD_COUNT]
    }
}

/// Which input device to open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputConfig {
    #[default]
    None,
    /// Microcontroller relaying four PlayStation pads over a serial line.
    Serial { path: PathBuf },
    /// Every gamepad gilrs can see, up to four.
    Gamepad,
    /// Keys on the controlling terminal.
    Keyboard,
}

/// The configured input device.
pub enum InputDevice {
    Null(NullPads),
    Serial(SerialPads),
    #[cfg(feature = "gamepad")]
    Gamepad(GamepadPads),
    Keyboard(KeyboardPads),
}

impl InputDevice {
    pub fn open(config: &InputConfig) -> Result<Self> {
        let device = match config {
            InputConfig::None => InputDevice::Null(NullPads),
            InputConfig::Serial { path } => InputDevice::Serial(
                SerialPads::open(path)
                    .with_context(|| format!("Failed to open serial pads at {}", path.display()))?,
            ),
            #[cfg(feature = "gamepad")]
            InputConfig::Gamepad => {
                InputDevice::Gamepad(GamepadPads::open().context("Failed to open gamepads")?)
            }
            #[cfg(not(feature = "gamepad"))]
            InputConfig::Gamepad => {
                anyhow::bail!("Gamepad input needs the `gamepad` feature")
            }
            InputConfig::Keyboard => InputDevice::Keyboard(
                KeyboardPads::spawn().context("Failed to set up keyboard pads")?,
            ),
        };
        info!("InputDevice: using {:?}", config);
        Ok(device)
    }
}

impl PadSource for InputDevice {
    fn pads(&self) -> [PadState; PAD_COUNT] {
        match self {
            InputDevice::Null(p) => p.pads(),
            InputDevice::Serial(p) => p.pads(),
            #[cfg(feature = "gamepad")]
            InputDevice::Gamepad(p) => p.pads(),
            InputDevice::Keyboard(p) => p.pads(),
        }
    }
}
