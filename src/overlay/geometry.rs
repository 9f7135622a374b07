//! Model-space to view-space box mapping.
//!
//! The inference model works in a fixed square of side `MODEL_SIZE` pixels.
//! The overlay renders in view pixels, which can be any size and aspect
//! ratio, so each axis scales independently (non-uniform scaling is allowed).
//!
//! Mapping is total and never panics:
//! - corner order is normalized (`x1 > x2` is fine)
//! - output coordinates are clamped into `[0, dimension]`
//! - width/height are never negative, even for degenerate input boxes
//! - an invalid view (either dimension <= 0) maps everything to a hidden
//!   zero box

use crate::detect::Detection;

/// Side of the square model input space, in model pixels.
pub const MODEL_SIZE: f32 = 640.0;

/// Width/height of the overlay's rendered area in on-screen pixels.
///
/// Zero until the first layout pass; updated on every layout change.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewSize {
    pub width: f32,
    pub height: f32,
}

impl ViewSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A view can be drawn into once both dimensions are positive.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// A detection transformed into view coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MappedBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Map one detection from model space into view space.
///
/// `model_size` is the side of the model's square input (usually
/// [`MODEL_SIZE`]); it is a parameter rather than a global so callers can
/// exercise other model geometries.
pub fn map_detection_to_box(detection: &Detection, view: ViewSize, model_size: f32) -> MappedBox {
    if !view.is_valid() || !(model_size > 0.0) {
        return MappedBox::default();
    }

    let scale_x = view.width / model_size;
    let scale_y = view.height / model_size;

    let left = (detection.x1.min(detection.x2) * scale_x).clamp(0.0, view.width);
    let right = (detection.x1.max(detection.x2) * scale_x).clamp(0.0, view.width);
    let top = (detection.y1.min(detection.y2) * scale_y).clamp(0.0, view.height);
    let bottom = (detection.y1.max(detection.y2) * scale_y).clamp(0.0, view.height);

    MappedBox {
        left,
        top,
        width: (right - left).max(0.0),
        height: (bottom - top).max(0.0),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
