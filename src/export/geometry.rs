//! Canonical orientation and box clipping.
//!
//! Plates are handled in a landscape frame: a portrait raster is rotated 90°
//! clockwise before anything else, and operator boxes are interpreted in the
//! rotated frame.

use crate::types::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Raster is already landscape (or square).
    Landscape,
    /// Raster is portrait and is rotated 90° clockwise.
    RotateClockwise,
}

/// Orientation rule: width < height means portrait.
pub const fn canonical_orientation(width: u32, height: u32) -> Orientation {
    if width < height {
        Orientation::RotateClockwise
    } else {
        Orientation::Landscape
    }
}

/// Integer pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_pixels(value: f64) -> i64 {
    if value.is_finite() {
        value.round().clamp(i64::MIN as f64, i64::MAX as f64) as i64
    } else {
        0
    }
}

/// Clip one axis: origin outside [0, span) resets to 0, extent is truncated
/// to what remains and widened to at least one pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clip_axis(origin: f64, extent: f64, span: u32) -> (u32, u32) {
    let span = i64::from(span.max(1));
    let mut start = to_pixels(origin);
    if start < 0 || start >= span {
        start = 0;
    }
    let len = to_pixels(extent).min(span - start).max(1);
    (start as u32, len as u32)
}

/// Clamp a box into a `width` x `height` frame. Never fails.
pub fn clip_box(bbox: &BoundingBox, width: u32, height: u32) -> PixelRect {
    let (x, w) = clip_axis(bbox.x, bbox.w, width);
    let (y, h) = clip_axis(bbox.y, bbox.h, height);
    PixelRect {
        x,
        y,
        width: w,
        height: h,
    }
}
