//! Live Detection Overlay kernel (LDO)
//!
//! This crate implements the capture-to-overlay pipeline for live object
//! detection: camera frames are handed to an inference plugin at a bounded
//! rate, detection results flow back over a push or pull channel, and a
//! slot-arena renderer keeps on-screen boxes in sync with the latest batch.
//!
//! # Architecture
//!
//! The pipeline holds five invariants by construction:
//!
//! 1. **Bounded Hand-Off**: frames reach the plugin at no more than the
//!    configured inference rate, no matter how fast the camera runs.
//! 2. **Latest Wins**: the overlay renders the newest batch only; superseded
//!    batches are overwritten, never queued.
//! 3. **Total Mapping**: every detection maps into the view clamped and
//!    normalized; malformed records are dropped without poisoning siblings.
//! 4. **Fixed Arena**: box slots are allocated once; redraws rewrite slots in
//!    place and never repaint an unchanged batch version.
//! 5. **Exact Teardown**: disable hides every box immediately, releases the
//!    channel exactly once, and re-enable starts from an empty batch.
//!
//! # Module Structure
//!
//! - `camera`: device registry, capture backends, throttled frame hand-off
//! - `detect`: result normalization, push/pull channels, the plugin seam
//! - `overlay`: model-to-view geometry and the slot-arena renderer
//! - `frame`: captured frame container (pixel data stays crate-private)

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

pub mod camera;
pub mod config;
pub mod detect;
pub mod frame;
pub mod overlay;

pub use camera::{
    coerce_max_fps, CameraSettings, CameraSource, CameraStats, DeviceRegistry, Facing,
    FpsGate, FrameOutcome, FrameSource, FrameSourceStats, DEFAULT_MAX_INFERENCE_FPS,
};
pub use config::{CaptureSettings, ChannelKind, DetectionSettings, OverlaySettings, OverlaydConfig};
pub use detect::{
    normalize_detections, BatchSnapshot, Detection, DetectionFeed, DetectionSource,
    EventStreamSource, FramePlugin, PluginHost, PluginInit, PollingSource, DETECTION_EVENT,
    POLL_INTERVAL_MS, YOLO_PLUGIN,
};
pub use frame::{CameraFrame, FrameHandle};
pub use overlay::{
    map_detection_to_box, BoxSlot, MappedBox, OverlayOptions, OverlayRenderer, ViewSize,
    MAX_RENDER_BOXES, MODEL_SIZE,
};

/// Snapshot of pipeline counters for health reporting.
#[derive(Clone, Debug)]
pub struct PipelineStats {
    pub frames: FrameSourceStats,
    pub batch_version: u64,
    pub boxes_visible: usize,
}

/// The assembled pipeline: frame source, detection channel, and renderer,
/// wired from one config.
///
/// `set_enabled` gates both ends at once: a disabled pipeline neither hands
/// frames to the plugin nor draws, so inference work stops rather than
/// running on with its output thrown away.
pub struct OverlayPipeline {
    source: FrameSource,
    renderer: OverlayRenderer,
}

impl OverlayPipeline {
    pub fn new(config: &OverlaydConfig) -> Result<Self> {
        let feed = Arc::new(DetectionFeed::new());
        let host = PluginHost::with_synthetic(Arc::clone(&feed), config.detection.synthetic_seed);

        let channel: Box<dyn DetectionSource> = match config.detection.channel {
            ChannelKind::Push => {
                Box::new(EventStreamSource::new(Arc::clone(&feed), DETECTION_EVENT))
            }
            ChannelKind::Poll => Box::new(PollingSource::new(
                host.accessor(&config.detection.plugin),
                Duration::from_millis(config.detection.poll_interval_ms),
            )),
        };

        let capture = CameraSettings {
            capture_fps: config.camera.capture_fps,
            width: config.camera.width,
            height: config.camera.height,
            health_grace_secs: config.camera.health_grace_secs,
        };
        let source = FrameSource::new(
            config.device_registry()?,
            host,
            &config.detection.plugin,
            capture,
            config.camera.facing,
            coerce_max_fps(config.detection.max_inference_fps),
        )?;

        let mut renderer = OverlayRenderer::new(
            channel,
            OverlayOptions {
                model_size: config.overlay.model_size,
                max_render_boxes: config.overlay.max_render_boxes,
            },
        );
        renderer.set_view_size(ViewSize::new(
            config.overlay.view_width,
            config.overlay.view_height,
        ));

        let mut pipeline = Self { source, renderer };
        pipeline.set_enabled(config.detection.enabled);
        Ok(pipeline)
    }

    /// Enable or disable detection end to end: the frame hand-off and the
    /// renderer flip together.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.source.set_detection_enabled(enabled);
        self.renderer.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.renderer.is_enabled()
    }

    /// Switch the active camera; the capture device reconnects and the plugin
    /// rebinds for the new facing.
    pub fn set_facing(&mut self, facing: Facing) -> Result<()> {
        self.source.set_facing(facing)
    }

    pub fn facing(&self) -> Facing {
        self.source.facing()
    }

    /// Record a layout change of the rendered area.
    pub fn set_view_size(&mut self, view: ViewSize) {
        self.renderer.set_view_size(view);
    }

    /// One pipeline cycle: capture (and maybe hand off) a frame, then give
    /// the renderer its draw tick.
    pub fn tick(&mut self, now: Instant) -> Result<FrameOutcome> {
        let outcome = self.source.process_next(now)?;
        self.renderer.on_frame(now);
        Ok(outcome)
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames: self.source.stats(),
            batch_version: self.renderer.batch_version(),
            boxes_visible: self.renderer.visible_boxes(),
        }
    }

    /// Stop everything: boxes hidden, channel released, capture idle.
    pub fn shutdown(&mut self) {
        self.renderer.teardown();
        self.source.set_detection_enabled(false);
        self.source.set_active(false);
        log::info!("OverlayPipeline: shut down");
    }
}
