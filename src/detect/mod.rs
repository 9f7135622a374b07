//! Detection results: normalization, channels, and the plugin seam.
//!
//! `batch` turns raw plugin payloads into well-formed detections; `channel`
//! carries batches to the renderer (push event or pull accessor behind the
//! `DetectionSource` trait); `plugin` hosts the inference plugin the frame
//! hand-off calls.

pub mod batch;
pub mod channel;
pub mod plugin;

pub use batch::{normalize_detections, Detection};
pub use channel::{
    BatchSnapshot, DetectionAccessor, DetectionFeed, DetectionSource, EventStreamSource,
    LatestCell, PollingSource, Subscription, POLL_INTERVAL_MS,
};
pub use plugin::{FramePlugin, PluginHost, PluginInit, DETECTION_EVENT, YOLO_PLUGIN};
