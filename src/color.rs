// src/color.rs

//! Defines the pixel color types (`Rgb`, `Color`) and the HSV conversion
//! every animation uses to derive display colors.

use serde::{Deserialize, Serialize};

/// An opaque 24-bit color, exactly what a panel pixel stores on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Converts an HSV triple to a byte color.
    ///
    /// Channels are scaled by 255 and truncated, matching how the
    /// animations have always quantized their colors.
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let (r, g, b) = hsv_to_rgb(hue, saturation, value);
        Rgb::new(unit_to_byte(r), unit_to_byte(g), unit_to_byte(b))
    }

    /// Perceived brightness in `[0, 1]`, weighted 0.3/0.6/0.1.
    pub fn luma(&self) -> f32 {
        (0.3 * self.r as f32 + 0.6 * self.g as f32 + 0.1 * self.b as f32) / 255.0
    }
}

/// A color handed to `Screen::set`.
///
/// The alpha channel of `Rgba` is accepted so callers can pass through
/// colors from decoded images, but it is dropped on write: compositing is
/// always "last write wins".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    Rgb(u8, u8, u8),
    Rgba(u8, u8, u8, u8),
}

impl Color {
    /// Returns the opaque part of this color.
    pub fn to_rgb(self) -> Rgb {
        match self {
            Color::Rgb(r, g, b) | Color::Rgba(r, g, b, _) => Rgb::new(r, g, b),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::Rgb(0, 0, 0)
    }
}

impl From<Rgb> for Color {
    fn from(c: Rgb) -> Self {
        Color::Rgb(c.r, c.g, c.b)
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Color::Rgb(r, g, b)
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(px: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = px.0;
        Color::Rgba(r, g, b, a)
    }
}

fn unit_to_byte(v: f64) -> u8 {
    // `as` saturates, so values slightly outside [0, 1] cannot wrap.
    (v * 255.0) as u8
}

/// Converts hue (degrees), saturation and value (both in `[0, 1]`) to RGB
/// components in `[0, 1]`.
///
/// The hue circle is cut into six 60° sectors. Hues of 360° and above fall
/// into the last sector rather than wrapping.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        // achromatic (grey)
        return (v, v, v);
    }

    let h = h / 60.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as i64 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
