// src/screen/panel.rs

//! Cuts a `Screen` into the per-panel payloads the controllers expect.
//!
//! Each panel is wired as two data lanes: the left nine columns and the
//! right nine columns. Each lane receives its half flattened row by row.

use super::{Screen, PANEL_HALF_WIDTH, PANEL_HEIGHT, PANEL_WIDTH, PIXEL_STRIDE};

/// Bytes in one half-panel payload: 9 columns × 18 rows × RGB.
pub const PANEL_HALF_BYTES: usize = PANEL_HALF_WIDTH * PANEL_HEIGHT * PIXEL_STRIDE;

/// Pixel payload for one data lane.
pub type PanelHalf = [u8; PANEL_HALF_BYTES];

const HALF_ROW_BYTES: usize = PANEL_HALF_WIDTH * PIXEL_STRIDE;
const PANEL_STRIDE: usize = PANEL_WIDTH * PIXEL_STRIDE;

/// Returns the left and right payloads of panel (`panel_x`, `panel_y`).
///
/// The caller guarantees the panel lies inside the screen's layout.
pub fn extract_panel(screen: &Screen, panel_x: usize, panel_y: usize) -> (PanelHalf, PanelHalf) {
    let mut left = [0u8; PANEL_HALF_BYTES];
    let mut right = [0u8; PANEL_HALF_BYTES];
    extract_panel_into(screen, panel_x, panel_y, &mut left, &mut right);
    (left, right)
}

/// Same as [`extract_panel`] but fills caller-owned buffers, so the
/// delivery path can reuse its packet template between panels.
pub fn extract_panel_into(
    screen: &Screen,
    panel_x: usize,
    panel_y: usize,
    left: &mut PanelHalf,
    right: &mut PanelHalf,
) {
    let layout = screen.layout();
    let line_stride = layout.line_stride();
    let panel_y_stride = line_stride * PANEL_HEIGHT;
    let panel_offset = panel_x * PANEL_STRIDE + panel_y * panel_y_stride;
    let pix = screen.as_bytes();

    for row in 0..PANEL_HEIGHT {
        let src = panel_offset + row * line_stride;
        let dst = row * HALF_ROW_BYTES;
        left[dst..dst + HALF_ROW_BYTES].copy_from_slice(&pix[src..src + HALF_ROW_BYTES]);
        right[dst..dst + HALF_ROW_BYTES]
            .copy_from_slice(&pix[src + HALF_ROW_BYTES..src + PANEL_STRIDE]);
    }
}
