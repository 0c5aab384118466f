// src/lib.rs

//! Drives a wall of 18×18 RGB LED panels over UDP.
//!
//! Producers (animations, uploaded images) paint into a [`screen::Screen`]
//! and publish it through a [`handoff::ScreenHandoff`]. A single
//! [`scheduler::FrameScheduler`] thread picks up the newest frame at a
//! steady rate and hands it to the [`client::InstaClient`], which slices
//! it into per-panel packets and broadcasts the sync that latches them.

pub mod animation;
pub mod client;
pub mod color;
pub mod config;
pub mod error;
pub mod handoff;
pub mod input;
pub mod preview;
pub mod protocol;
pub mod scheduler;
pub mod screen;
pub mod upload;
