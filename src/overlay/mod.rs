//! Detection overlay rendering.
//!
//! `geometry` maps model-space boxes into view pixels; `renderer` owns the
//! slot arena and decides per tick whether anything needs repainting.

pub mod geometry;
pub mod renderer;

pub use geometry::{map_detection_to_box, MappedBox, ViewSize, MODEL_SIZE};
pub use renderer::{BoxSlot, OverlayOptions, OverlayRenderer, MAX_RENDER_BOXES};
