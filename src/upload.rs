// src/upload.rs

//! Shows images sent over TCP.
//!
//! Each connection carries one image file (PNG, JPEG or GIF). It is scaled
//! to the wall and published to the hand-off; animated GIFs play through
//! their frames with the recorded delays. Errors are written back to the
//! client as a line of text before the connection is closed.

use crate::color::Color;
use crate::handoff::{ScreenHandoff, Takeover};
use crate::screen::{PanelLayout, Screen};
use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use log::*;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_MAX_PIXELS: u64 = 10_000_000;
pub const DEFAULT_MAX_FRAMES: usize = 1000;
/// Pixels decoded across all frames of one GIF; every frame is decoded at
/// full canvas size.
pub const DEFAULT_MAX_DECODED_PIXELS: u64 = 200_000_000;
/// Upper bound on the bytes read from one connection.
pub const MAX_UPLOAD_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub enabled: bool,
    pub bind: String,
    /// Largest accepted image, in source pixels.
    pub max_pixels: u64,
    /// Most GIF frames kept from one upload.
    pub max_frames: usize,
    /// Budget of decoded source pixels over all frames of one upload.
    pub max_decoded_pixels: u64,
    /// How long a still image keeps the wall before the show resumes.
    pub hold_secs: u64,
    /// A client that goes quiet for this long is assumed to be done sending.
    pub read_timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            enabled: false,
            bind: "0.0.0.0:2323".to_string(),
            max_pixels: DEFAULT_MAX_PIXELS,
            max_frames: DEFAULT_MAX_FRAMES,
            max_decoded_pixels: DEFAULT_MAX_DECODED_PIXELS,
            hold_secs: 10,
            read_timeout_ms: 5000,
        }
    }
}

impl UploadConfig {
    pub fn limits(&self) -> UploadLimits {
        UploadLimits {
            max_pixels: self.max_pixels,
            max_frames: self.max_frames,
            max_decoded_pixels: self.max_decoded_pixels,
        }
    }
}

/// Bounds on what one upload may cost to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_pixels: u64,
    pub max_frames: usize,
    pub max_decoded_pixels: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadConfig::default().limits()
    }
}

#[derive(Debug)]
pub enum UploadError {
    TooLarge { width: u32, height: u32 },
    /// A GIF exceeded the frame count or decoded pixel budget.
    TooManyFrames { decoded: usize },
    Image(image::ImageError),
    Io(io::Error),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::TooLarge { .. } => write!(f, "too large"),
            UploadError::TooManyFrames { .. } => write!(f, "too many frames"),
            UploadError::Image(e) => write!(f, "{}", e),
            UploadError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::TooLarge { .. } | UploadError::TooManyFrames { .. } => None,
            UploadError::Image(e) => Some(e),
            UploadError::Io(e) => Some(e),
        }
    }
}

impl From<image::ImageError> for UploadError {
    fn from(e: image::ImageError) -> Self {
        UploadError::Image(e)
    }
}

impl From<io::Error> for UploadError {
    fn from(e: io::Error) -> Self {
        UploadError::Io(e)
    }
}

/// A decoded frame and how long it stays up.
#[derive(Debug, Clone)]
pub struct UploadFrame {
    pub screen: Screen,
    /// Zero for still images.
    pub delay: Duration,
}

/// Draws `img` scaled to the wall, composited over black.
fn to_screen(img: &RgbaImage, layout: PanelLayout) -> Screen {
    let scaled = imageops::resize(
        img,
        layout.width() as u32,
        layout.height() as u32,
        FilterType::Triangle,
    );
    let mut screen = Screen::new(layout);
    for (x, y, px) in scaled.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let over_black = |c: u8| (c as u16 * a as u16 / 255) as u8;
        let px = Rgba([over_black(r), over_black(g), over_black(b), 255]);
        screen.set(x as i64, y as i64, Color::from(px));
    }
    screen
}

/// Decodes an uploaded file into wall-sized frames.
pub fn decode_upload(
    data: &[u8],
    layout: PanelLayout,
    limits: &UploadLimits,
) -> Result<Vec<UploadFrame>, UploadError> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let format = reader.format();
    let (width, height) = reader.into_dimensions()?;
    let pixels = width as u64 * height as u64;
    if pixels > limits.max_pixels {
        return Err(UploadError::TooLarge { width, height });
    }
    debug!("decode_upload: {:?} {}x{}", format, width, height);

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(data))?;
        let mut frames = Vec::new();
        let mut decoded = 0u64;
        for frame in decoder.into_frames() {
            decoded = decoded.saturating_add(pixels);
            if frames.len() >= limits.max_frames || decoded > limits.max_decoded_pixels {
                return Err(UploadError::TooManyFrames {
                    decoded: frames.len(),
                });
            }
            let frame = frame?;
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = Duration::from_millis(u64::from(numer / denom.max(1)));
            frames.push(UploadFrame {
                screen: to_screen(frame.buffer(), layout),
                delay,
            });
        }
        return Ok(frames);
    }

    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    Ok(vec![UploadFrame {
        screen: to_screen(&img, layout),
        delay: Duration::ZERO,
    }])
}

pub struct UploadServer {
    listener: TcpListener,
    layout: PanelLayout,
    handoff: Arc<ScreenHandoff>,
    takeover: Arc<Takeover>,
    config: UploadConfig,
}

impl UploadServer {
    pub fn bind(
        config: &UploadConfig,
        layout: PanelLayout,
        handoff: Arc<ScreenHandoff>,
        takeover: Arc<Takeover>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind)
            .with_context(|| format!("Failed to listen on {}", config.bind))?;
        Ok(UploadServer {
            listener,
            layout,
            handoff,
            takeover,
            config: config.clone(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections on a background thread, one thread per client.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("upload-server".to_string())
            .spawn(move || self.serve())
            .context("Failed to spawn upload server thread")
    }

    fn serve(self) {
        info!("UploadServer: listening on {:?}", self.local_addr().ok());
        for conn in self.listener.incoming() {
            let stream = match conn {
                Ok(s) => s,
                Err(e) => {
                    warn!("UploadServer: accept failed: {}", e);
                    continue;
                }
            };
            let peer = stream.peer_addr().ok();
            let job = Connection {
                layout: self.layout,
                handoff: self.handoff.clone(),
                takeover: self.takeover.clone(),
                config: self.config.clone(),
            };
            let spawned = thread::Builder::new()
                .name("upload-conn".to_string())
                .spawn(move || job.handle(stream));
            if let Err(e) = spawned {
                error!("UploadServer: cannot serve {:?}: {}", peer, e);
            }
        }
    }
}

struct Connection {
    layout: PanelLayout,
    handoff: Arc<ScreenHandoff>,
    takeover: Arc<Takeover>,
    config: UploadConfig,
}

impl Connection {
    fn handle(self, mut stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        info!("UploadServer: connection from {:?}", peer);
        if let Err(e) = self.show(&mut stream) {
            warn!("UploadServer: upload from {:?} failed: {}", peer, e);
            if let Err(e) = writeln!(stream, "{}", e) {
                debug!("UploadServer: could not report error to {:?}: {}", peer, e);
            }
        }
    }

    fn show(&self, stream: &mut TcpStream) -> Result<(), UploadError> {
        let data = self.receive(stream)?;
        let frames = decode_upload(&data, self.layout, &self.config.limits())?;
        let total: Duration = frames.iter().map(|f| f.delay).sum();
        let hold = Duration::from_secs(self.config.hold_secs);
        self.takeover.claim(total + hold);
        info!("UploadServer: showing {} frame(s)", frames.len());
        for frame in frames {
            self.handoff.publish_owned(frame.screen);
            thread::sleep(frame.delay);
        }
        Ok(())
    }

    /// Reads until the client closes its side or goes quiet.
    fn receive(&self, stream: &mut TcpStream) -> io::Result<Vec<u8>> {
        stream.set_read_timeout(Some(Duration::from_millis(self.config.read_timeout_ms.max(1))))?;
        let mut data = Vec::new();
        match stream.take(MAX_UPLOAD_BYTES).read_to_end(&mut data) {
            Ok(_) => Ok(data),
            Err(e)
                if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
                    && !data.is_empty() =>
            {
                Ok(data)
            }
            Err(e) => Err(e),
        }
    }
}
