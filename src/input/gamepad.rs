// src/input/gamepad.rs

//! USB and Bluetooth gamepads through gilrs.
//!
//! Up to four pads are assigned to slots in the order they first send an
//! event. A pad that disconnects frees its slot and reads as released.

use super::{Buttons, PadSource, PadState, PAD_COUNT};
use anyhow::{anyhow, Context};
use gilrs::{Axis, Button, Event, EventType, Gilrs};
use log::{debug, error, info};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Stick deflection beyond which it also counts as a direction press.
pub const DEADZONE: f32 = 0.15;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

const BUTTON_MAP: [(Button, Buttons); 14] = [
    (Button::DPadUp, Buttons::UP),
    (Button::DPadRight, Buttons::RIGHT),
    (Button::DPadDown, Buttons::DOWN),
    (Button::DPadLeft, Buttons::LEFT),
    (Button::North, Buttons::TRIANGLE),
    (Button::East, Buttons::CIRCLE),
    (Button::South, Buttons::CROSS),
    (Button::West, Buttons::SQUARE),
    (Button::LeftTrigger, Buttons::L1),
    (Button::LeftTrigger2, Buttons::L2),
    (Button::RightTrigger, Buttons::R1),
    (Button::RightTrigger2, Buttons::R2),
    (Button::Select, Buttons::SELECT),
    (Button::Start, Buttons::START),
];

fn pad_button(button: Button) -> Option<Buttons> {
    match button {
        Button::Mode => Some(Buttons::START),
        _ => BUTTON_MAP
            .iter()
            .find(|(b, _)| *b == button)
            .map(|&(_, pad)| pad),
    }
}

/// Raw state of one gamepad as reported by gilrs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadState {
    buttons: Buttons,
    /// gilrs convention: y points up.
    left: (f32, f32),
    right: (f32, f32),
}

impl GamepadState {
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if let Some(b) = pad_button(button) {
            self.buttons.set(b, pressed);
        }
    }

    pub fn set_axis(&mut self, axis: Axis, value: f32) {
        let value = value.clamp(-1.0, 1.0);
        match axis {
            Axis::LeftStickX => self.left.0 = value,
            Axis::LeftStickY => self.left.1 = value,
            Axis::RightStickX => self.right.0 = value,
            Axis::RightStickY => self.right.1 = value,
            _ => {}
        }
    }

    pub fn to_pad(&self) -> PadState {
        let mut buttons = self.buttons;
        let (x, y) = self.left;
        buttons.set(Buttons::UP, buttons.contains(Buttons::UP) || y > DEADZONE);
        buttons.set(Buttons::DOWN, buttons.contains(Buttons::DOWN) || y < -DEADZONE);
        buttons.set(Buttons::LEFT, buttons.contains(Buttons::LEFT) || x < -DEADZONE);
        buttons.set(Buttons::RIGHT, buttons.contains(Buttons::RIGHT) || x > DEADZONE);
        PadState {
            buttons,
            left_stick: (self.left.0, -self.left.1),
            right_stick: (self.right.0, -self.right.1),
        }
    }
}

/// Assigns gamepad ids to the four pad slots.
#[derive(Debug, Default)]
pub struct PadSlots {
    ids: [Option<usize>; PAD_COUNT],
    states: [GamepadState; PAD_COUNT],
}

impl PadSlots {
    fn slot(&mut self, id: usize) -> Option<usize> {
        if let Some(i) = self.ids.iter().position(|s| *s == Some(id)) {
            return Some(i);
        }
        let free = self.ids.iter().position(Option::is_none)?;
        info!("GamepadPads: gamepad {} takes pad {}", id, free);
        self.ids[free] = Some(id);
        Some(free)
    }

    pub fn button(&mut self, id: usize, button: Button, pressed: bool) {
        if let Some(i) = self.slot(id) {
            self.states[i].set_button(button, pressed);
        }
    }

    pub fn axis(&mut self, id: usize, axis: Axis, value: f32) {
        if let Some(i) = self.slot(id) {
            self.states[i].set_axis(axis, value);
        }
    }

    pub fn disconnect(&mut self, id: usize) {
        if let Some(i) = self.ids.iter().position(|s| *s == Some(id)) {
            info!("GamepadPads: gamepad {} left pad {}", id, i);
            self.ids[i] = None;
            self.states[i] = GamepadState::default();
        }
    }

    pub fn apply(&mut self, id: usize, event: &EventType) {
        match *event {
            EventType::ButtonPressed(button, _) => self.button(id, button, true),
            EventType::ButtonReleased(button, _) => self.button(id, button, false),
            EventType::AxisChanged(axis, value, _) => self.axis(id, axis, value),
            EventType::Disconnected => self.disconnect(id),
            _ => {}
        }
    }

    pub fn pads(&self) -> [PadState; PAD_COUNT] {
        let mut pads = [PadState::default(); PAD_COUNT];
        for (pad, state) in pads.iter_mut().zip(&self.states) {
            *pad = state.to_pad();
        }
        pads
    }
}

/// Gamepads polled by a background thread.
pub struct GamepadPads {
    state: Arc<Mutex<[PadState; PAD_COUNT]>>,
}

impl GamepadPads {
    /// Starts the gilrs event loop. Fails if the platform has no gamepad
    /// support.
    pub fn open() -> anyhow::Result<Self> {
        let state = Arc::new(Mutex::new([PadState::default(); PAD_COUNT]));
        let shared = state.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        thread::Builder::new()
            .name("gamepad-pads".to_string())
            .spawn(move || {
                // gilrs lives on this thread only
                let mut gilrs = match Gilrs::new() {
                    Ok(gilrs) => gilrs,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                for (id, pad) in gilrs.gamepads() {
                    info!("GamepadPads: found {} ({})", pad.name(), id);
                }
                let _ = ready_tx.send(Ok(()));

                let mut slots = PadSlots::default();
                loop {
                    while let Some(Event { id, event, .. }) = gilrs.next_event() {
                        debug!("GamepadPads: {} {:?}", id, event);
                        slots.apply(usize::from(id), &event);
                    }
                    *shared.lock().unwrap_or_else(PoisonError::into_inner) = slots.pads();
                    thread::sleep(POLL_INTERVAL);
                }
            })
            .context("Failed to spawn gamepad thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(GamepadPads { state }),
            Ok(Err(e)) => {
                error!("GamepadPads: gilrs unavailable: {}", e);
                Err(anyhow!("Failed to initialize gamepads: {}", e))
            }
            Err(_) => Err(anyhow!("Gamepad thread exited during setup")),
        }
    }
}

impl PadSource for GamepadPads {
    fn pads(&self) -> [PadState; PAD_COUNT] {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
