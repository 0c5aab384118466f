// src/preview.rs

//! Terminal preview of the wall.
//!
//! Renders every new frame as ASCII greyscale art, so animations can be
//! developed without the panels. The preview reads the hand-off
//! exactly-once and runs on its own slow, phase-locked clock; frames
//! published in between are simply never shown.

use crate::handoff::ScreenHandoff;
use crate::scheduler::{frame_duration, normalize_fps, DeadlinePacer};
use crate::screen::Screen;
use anyhow::{Context, Result};
use log::*;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Characters from darkest to brightest.
pub const ASCII_RAMP: &[u8] =
    b" .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";

const CLEAR_AND_HOME: &str = "\x1b[2J\x1b[;H";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: bool,
    pub fps: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            enabled: false,
            fps: 10,
        }
    }
}

/// One character per pixel, one line per row.
pub fn render_ascii(screen: &Screen) -> String {
    let mut out = String::with_capacity((screen.width() + 1) * screen.height());
    for y in 0..screen.height() as i64 {
        for x in 0..screen.width() as i64 {
            let luma = screen.get(x, y).unwrap_or_default().luma();
            let i = (luma * (ASCII_RAMP.len() - 1) as f32) as usize;
            out.push(ASCII_RAMP[i.min(ASCII_RAMP.len() - 1)] as char);
        }
        out.push('\n');
    }
    out
}

pub struct TermPreview<W> {
    handoff: Arc<ScreenHandoff>,
    pacer: DeadlinePacer,
    out: W,
    shown: u64,
}

impl<W: Write> TermPreview<W> {
    pub fn new(handoff: Arc<ScreenHandoff>, fps: u32, out: W) -> Self {
        let fps = normalize_fps(fps as i64);
        TermPreview {
            handoff,
            pacer: DeadlinePacer::new(frame_duration(fps)),
            out,
            shown: 0,
        }
    }

    /// Frames drawn so far.
    pub fn shown(&self) -> u64 {
        self.shown
    }

    /// Waits for the next slot and draws the newest unseen frame, if any.
    /// Returns whether a frame was drawn.
    pub fn step(&mut self) -> io::Result<bool> {
        let pace = self.pacer.advance(Instant::now());
        if pace.dropped > 0 {
            debug!("TermPreview: skipped {} slot(s)", pace.dropped);
        }
        thread::sleep(pace.wait);

        let Some(frame) = self.handoff.take() else {
            return Ok(false);
        };
        write!(self.out, "{}{}", CLEAR_AND_HOME, render_ascii(&frame))?;
        self.out.flush()?;
        self.shown += 1;
        Ok(true)
    }
}

impl TermPreview<io::Stdout> {
    /// Draws to stdout on a background thread until writing fails.
    pub fn spawn(handoff: Arc<ScreenHandoff>, fps: u32) -> Result<JoinHandle<()>> {
        let mut preview = TermPreview::new(handoff, fps, io::stdout());
        thread::Builder::new()
            .name("term-preview".to_string())
            .spawn(move || {
                info!("TermPreview: started");
                loop {
                    if let Err(e) = preview.step() {
                        error!("TermPreview: stopped after {} frames: {}", preview.shown(), e);
                        break;
                    }
                }
            })
            .context("Failed to spawn terminal preview thread")
    }
}
