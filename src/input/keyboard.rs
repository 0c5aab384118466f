// src/input/keyboard.rs

//! Two pads driven from the controlling terminal's keyboard.
//!
//! Pad 0: `w a s d` for directions, `q` for square, space for start.
//! Pad 1: `i j k l` for directions, `u` for square.
//!
//! Only the most recent key is remembered, and reading the pads consumes it,
//! so every key press acts exactly once.

use super::{Buttons, PadSource, PadState, PAD_COUNT};
use log::{debug, error, info, warn};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use std::io::{self, Read};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

/// Pads produced by a single key byte. Unmapped keys press nothing.
pub fn byte_to_pads(key: u8) -> [PadState; PAD_COUNT] {
    let mut pads = [PadState::default(); PAD_COUNT];
    let (pad, button) = match key {
        b'w' => (0, Buttons::UP),
        b's' => (0, Buttons::DOWN),
        b'a' => (0, Buttons::LEFT),
        b'd' => (0, Buttons::RIGHT),
        b'q' => (0, Buttons::SQUARE),
        b' ' => (0, Buttons::START),
        b'i' => (1, Buttons::UP),
        b'k' => (1, Buttons::DOWN),
        b'j' => (1, Buttons::LEFT),
        b'l' => (1, Buttons::RIGHT),
        b'u' => (1, Buttons::SQUARE),
        _ => return pads,
    };
    pads[pad].buttons = button;
    pads
}

/// Keyboard pads. Restores the terminal mode when dropped.
pub struct KeyboardPads {
    last_key: Arc<Mutex<Option<u8>>>,
    original_termios: Option<Termios>,
}

impl KeyboardPads {
    /// Switches stdin to unbuffered, no-echo input and starts reading keys.
    pub fn spawn() -> anyhow::Result<Self> {
        let original_termios = match termios::tcgetattr(io::stdin()) {
            Ok(tio) => {
                let mut raw = tio.clone();
                raw.local_flags &= !(LocalFlags::ICANON | LocalFlags::ECHO);
                raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
                raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
                termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw)?;
                Some(tio)
            }
            Err(e) => {
                warn!(
                    "KeyboardPads: stdin is not a terminal ({}). Keys will need Enter.",
                    e
                );
                None
            }
        };

        let last_key = Arc::new(Mutex::new(None));
        let shared = last_key.clone();
        thread::Builder::new()
            .name("keyboard-pads".to_string())
            .spawn(move || {
                let mut stdin = io::stdin().lock();
                let mut key = [0u8; 1];
                loop {
                    match stdin.read(&mut key) {
                        Ok(0) => {
                            info!("KeyboardPads: stdin closed");
                            break;
                        }
                        Ok(_) => {
                            debug!("KeyboardPads: key {:?}", key[0] as char);
                            *shared.lock().unwrap_or_else(PoisonError::into_inner) = Some(key[0]);
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            error!("KeyboardPads: reader stopped: {}", e);
                            break;
                        }
                    }
                }
            })?;

        Ok(KeyboardPads {
            last_key,
            original_termios,
        })
    }
}

impl PadSource for KeyboardPads {
    fn pads(&self) -> [PadState; PAD_COUNT] {
        let key = self
            .last_key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        key.map(byte_to_pads).unwrap_or_default()
    }
}

impl Drop for KeyboardPads {
    fn drop(&mut self) {
        if let Some(tio) = self.original_termios.take() {
            if let Err(e) = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &tio) {
                error!("KeyboardPads: failed to restore terminal: {}", e);
            }
        }
    }
}
