// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Detected-marker records and the debug overlay drawn on RGB frames.

use serde::{Deserialize, Serialize};

/// Disc radius, in pixels, drawn at each marker corner.
pub const MARKER_RADIUS: i32 = 2;
/// Overlay color (green).
pub const MARKER_COLOR: [u8; 3] = [0, 255, 0];

/// One fiducial detected by the tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Marker {
    /// Marker id.
    pub id: i32,
    /// Orientation index reported by the detector.
    pub dir: i32,
    /// Detector confidence.
    pub confidence: f32,
    /// Marker family tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Center in pixels, `[x, y]`.
    pub center: Vec<f32>,
    /// Corners in pixels, flat `[x0, y0, x1, y1, ...]`.
    pub corners: Vec<f32>,
}

/// Payload of `<camera>:detected-markers`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSet {
    /// Markers in this frame.
    pub markers: Vec<Marker>,
    /// Optional pose estimated from the markers (16 floats, row-major).
    pub pose: Vec<f32>,
}

impl MarkerSet {
    /// Parse the JSON payload.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Draw a filled disc at every marker corner into an RGB24 `buffer`.
/// Pixels outside the image are skipped, as are non-finite corners.
pub fn overlay_markers(buffer: &mut [u8], width: usize, height: usize, markers: &[Marker]) {
    for marker in markers {
        for corner in marker.corners.chunks_exact(2) {
            let (Some(cx), Some(cy)) =
                (pixel_coord(corner[0], width), pixel_coord(corner[1], height))
            else {
                continue;
            };
            draw_disc(buffer, width, height, cx, cy, MARKER_RADIUS, MARKER_COLOR);
        }
    }
}

/// Corner coordinate pinned just outside `[0, extent)` so far-off corners
/// still clip instead of overflowing.
fn pixel_coord(value: f32, extent: usize) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let margin = MARKER_RADIUS + 1;
    let limit = i32::try_from(extent).unwrap_or(i32::MAX - margin).saturating_add(margin);
    Some((value as i32).clamp(-margin, limit))
}

/// Filled disc centered on `(cx, cy)`, mirrored from one quadrant.
pub fn draw_disc(
    buffer: &mut [u8],
    width: usize,
    height: usize,
    cx: i32,
    cy: i32,
    radius: i32,
    color: [u8; 3],
) {
    for x in 0..=radius {
        let d = f64::from(radius * radius - x * x).sqrt().ceil() as i32;
        for y in 0..=d {
            let (right, left) = (cx.saturating_add(x), cx.saturating_sub(x));
            let (down, up) = (cy.saturating_add(y), cy.saturating_sub(y));
            for (px, py) in [(right, down), (right, up), (left, down), (left, up)] {
                put_pixel(buffer, width, height, px, py, color);
            }
        }
    }
}

fn put_pixel(buffer: &mut [u8], width: usize, height: usize, x: i32, y: i32, color: [u8; 3]) {
    let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
        return;
    };
    if x >= width || y >= height {
        return;
    }
    let at = (y * width + x) * 3;
    if let Some(px) = buffer.get_mut(at..at + 3) {
        px.copy_from_slice(&color);
    }
}
