// src/main.rs

//! Entry point: connects to the wall and runs the configured show.

use anyhow::Context;
use insta_wall::{
    animation::{LevelFeed, Show},
    client::{FrameSink, InstaClient},
    config,
    handoff::{ScreenHandoff, Takeover},
    input::InputDevice,
    preview::TermPreview,
    scheduler::FrameScheduler,
    upload::UploadServer,
};
use log::{error, info};
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting insta-wall...");

    let config = config::config()?;
    let layout = config.wall.layout();
    info!(
        "Wall: {}x{} panels ({}x{} pixels)",
        layout.panels_x,
        layout.panels_y,
        layout.width(),
        layout.height()
    );

    let mut client = match InstaClient::connect(layout, &config.wall.addresses) {
        Ok(c) => c,
        Err(e) => {
            error!("Cannot reach the wall: {}", e);
            return Err(e).context("Failed to set up the panel client");
        }
    };
    if let Some(level) = config.delivery.brightness {
        client.set_brightness(level);
    }
    if let Some(level) = config.delivery.contrast {
        client.set_contrast(level);
    }
    if let Some(level) = config.delivery.afterglow {
        client.set_afterglow(level);
    }

    let handoff = Arc::new(ScreenHandoff::new());
    let takeover = Arc::new(Takeover::new());
    let fps = config.delivery.fps();

    FrameScheduler::new(client, handoff.clone(), fps as i64)
        .with_backoff(config.delivery.backoff())
        .with_pacing(config.delivery.pacing)
        .spawn()?;

    if config.preview.enabled {
        TermPreview::spawn(handoff.clone(), config.preview.fps)?;
    }

    if config.upload.enabled {
        UploadServer::bind(&config.upload, layout, handoff.clone(), takeover.clone())?.spawn()?;
    }

    let pads = InputDevice::open(&config.input)?;

    let mut show = Show::new(layout, handoff, Box::new(pads), &config.show, fps)
        .with_takeover(takeover);
    if let Some(feed) = LevelFeed::open(&config.levels, layout)? {
        show = show.with_levels(feed);
    }
    show.run()
}
