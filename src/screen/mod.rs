// src/screen/mod.rs

//! The pixel buffer that every producer paints into and the delivery path
//! serializes.
//!
//! A `Screen` is a packed RGB grid sized to a fixed grid of 18×18 panels.
//! Memory is row-major over the whole wall (not per panel); the panel
//! tiling only matters when the buffer is cut into wire payloads, see
//! [`panel`].

pub mod blend;
pub mod panel;


use crate::color::{Color, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use blend::{blend, Blend};
pub use panel::{extract_panel, PanelHalf, PANEL_HALF_BYTES};

/// Width of one physical panel in pixels.
pub const PANEL_WIDTH: usize = 18;
/// Height of one physical panel in pixels.
pub const PANEL_HEIGHT: usize = 18;
/// Width of one data lane (half a panel).
pub const PANEL_HALF_WIDTH: usize = PANEL_WIDTH / 2;
/// Bytes per pixel (R, G, B).
pub const PIXEL_STRIDE: usize = 3;

/// The panel grid of the wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelLayout {
    pub panels_x: usize,
    pub panels_y: usize,
}

impl PanelLayout {
    pub const fn new(panels_x: usize, panels_y: usize) -> Self {
        PanelLayout { panels_x, panels_y }
    }

    pub const fn panel_count(&self) -> usize {
        self.panels_x * self.panels_y
    }

    /// Wall width in pixels.
    pub const fn width(&self) -> usize {
        self.panels_x * PANEL_WIDTH
    }

    /// Wall height in pixels.
    pub const fn height(&self) -> usize {
        self.panels_y * PANEL_HEIGHT
    }

    /// Bytes in one full pixel row of the wall.
    pub const fn line_stride(&self) -> usize {
        PIXEL_STRIDE * PANEL_WIDTH * self.panels_x
    }

    /// Panels in row-major order (y outer, x inner), the order frames are
    /// delivered in.
    pub fn panels(&self) -> impl Iterator<Item = (usize, usize)> {
        let panels_x = self.panels_x;
        (0..self.panels_y).flat_map(move |y| (0..panels_x).map(move |x| (x, y)))
    }
}

impl Default for PanelLayout {
    /// The original wall: three panels wide, two high.
    fn default() -> Self {
        PanelLayout::new(3, 2)
    }
}

/// A packed RGB pixel buffer covering the whole wall.
///
/// The buffer length is always `width * height * 3`. Writes outside the
/// wall are ignored, reads outside the wall return `None`.
#[derive(Clone, PartialEq, Eq)]
pub struct Screen {
    layout: PanelLayout,
    pix: Vec<u8>,
}

impl Screen {
    /// Creates an all-black screen for the given panel grid.
    pub fn new(layout: PanelLayout) -> Self {
        Screen {
            layout,
            pix: vec![0; layout.width() * layout.height() * PIXEL_STRIDE],
        }
    }

    pub fn layout(&self) -> PanelLayout {
        self.layout
    }

    pub fn width(&self) -> usize {
        self.layout.width()
    }

    pub fn height(&self) -> usize {
        self.layout.height()
    }

    /// Raw pixel bytes, row-major, three bytes per pixel.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pix
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pix
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return None;
        }
        Some(y as usize * self.layout.line_stride() + x as usize * PIXEL_STRIDE)
    }

    /// Writes one pixel. Coordinates outside the wall are silently clipped.
    pub fn set(&mut self, x: i64, y: i64, color: impl Into<Color>) {
        let Some(offset) = self.offset(x, y) else {
            return;
        };
        let rgb = color.into().to_rgb();
        self.pix[offset] = rgb.r;
        self.pix[offset + 1] = rgb.g;
        self.pix[offset + 2] = rgb.b;
    }

    /// Reads one pixel, `None` outside the wall.
    pub fn get(&self, x: i64, y: i64) -> Option<Rgb> {
        let offset = self.offset(x, y)?;
        Some(Rgb::new(
            self.pix[offset],
            self.pix[offset + 1],
            self.pix[offset + 2],
        ))
    }

    /// Returns an independent deep copy, safe to hand to another thread.
    pub fn copy(&self) -> Screen {
        self.clone()
    }

    /// Resets every pixel to black.
    pub fn clear(&mut self) {
        self.pix.fill(0);
    }

    pub fn fill(&mut self, color: impl Into<Color>) {
        let rgb = color.into().to_rgb();
        for px in self.pix.chunks_exact_mut(PIXEL_STRIDE) {
            px.copy_from_slice(&[rgb.r, rgb.g, rgb.b]);
        }
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

/// Hex dump, one line per pixel row, `rrggbb` per pixel.
impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.pix.chunks_exact(self.layout.line_stride()) {
            for px in row.chunks_exact(PIXEL_STRIDE) {
                write!(f, "{:02x}{:02x}{:02x} ", px[0], px[1], px[2])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
