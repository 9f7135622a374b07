//! Slot-arena box renderer.
//!
//! The renderer owns a fixed arena of box slots, allocated once. Every draw
//! tick either reuses the last drawn state (version unchanged) or rewrites
//! the arena in place: one slot per detection up to the arena size, the rest
//! hidden. Slots are never allocated per frame and never reordered.
//!
//! Redraw is memoized on the batch version: a tick with an unchanged version
//! touches nothing. An invalid view size (before the first layout pass)
//! skips the draw WITHOUT recording the version, so the first valid layout
//! paints the batch that arrived while the view was unsized.
//!
//! The renderer MUST NOT:
//! - Draw while disabled (disable hides every slot immediately)
//! - Carry state across an enable cycle: re-enable starts from an empty
//!   batch and a cleared memo

use std::time::Instant;

use crate::detect::{BatchSnapshot, DetectionSource};

use super::geometry::{map_detection_to_box, ViewSize, MODEL_SIZE};

/// Size of the slot arena; detections beyond this many are not rendered.
pub const MAX_RENDER_BOXES: usize = 20;

/// One renderable box slot. Hidden slots keep their zeroed geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxSlot {
    pub visible: bool,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Renderer tunables. Defaults match the live pipeline.
#[derive(Clone, Copy, Debug)]
pub struct OverlayOptions {
    pub model_size: f32,
    pub max_render_boxes: usize,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            model_size: MODEL_SIZE,
            max_render_boxes: MAX_RENDER_BOXES,
        }
    }
}

pub struct OverlayRenderer {
    options: OverlayOptions,
    source: Box<dyn DetectionSource>,
    slots: Vec<BoxSlot>,
    view: ViewSize,
    last_drawn: Option<u64>,
    enabled: bool,
}

impl OverlayRenderer {
    /// Renderer over a detection source. Starts disabled with an unsized
    /// view; the arena is allocated here and reused for the renderer's life.
    pub fn new(source: Box<dyn DetectionSource>, options: OverlayOptions) -> Self {
        Self {
            source,
            slots: vec![BoxSlot::default(); options.max_render_boxes],
            options,
            view: ViewSize::default(),
            last_drawn: None,
            enabled: false,
        }
    }

    /// Enable or disable rendering.
    ///
    /// Enabling arms the detection source from a clean slate; disabling
    /// releases it and hides every slot on the spot.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.source.on_enabled();
            self.last_drawn = None;
            log::info!("OverlayRenderer: enabled");
        } else {
            self.source.on_disabled();
            self.hide_all();
            self.last_drawn = None;
            log::info!("OverlayRenderer: disabled");
        }
    }

    /// Record a layout change. Any size change invalidates the draw memo so
    /// the current batch is remapped at the new scale on the next tick.
    pub fn set_view_size(&mut self, view: ViewSize) {
        if self.view == view {
            return;
        }
        self.view = view;
        self.last_drawn = None;
    }

    /// One draw tick: pump the source, then redraw iff there is a new batch
    /// version and the view has a drawable size.
    pub fn on_frame(&mut self, now: Instant) {
        if !self.enabled {
            return;
        }
        self.source.pump(now);
        let snapshot = self.source.snapshot();
        if self.last_drawn == Some(snapshot.version) {
            return;
        }
        if !self.view.is_valid() {
            // No memo update: the first valid layout must paint this batch.
            return;
        }
        self.redraw(&snapshot);
        self.last_drawn = Some(snapshot.version);
    }

    fn redraw(&mut self, snapshot: &BatchSnapshot) {
        let rendered = snapshot.detections.len().min(self.slots.len());
        for (slot, detection) in self.slots.iter_mut().zip(snapshot.detections.iter()) {
            let mapped = map_detection_to_box(detection, self.view, self.options.model_size);
            *slot = BoxSlot {
                visible: true,
                left: mapped.left,
                top: mapped.top,
                width: mapped.width,
                height: mapped.height,
            };
        }
        for slot in self.slots.iter_mut().skip(rendered) {
            *slot = BoxSlot::default();
        }
    }

    fn hide_all(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = BoxSlot::default();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn view_size(&self) -> ViewSize {
        self.view
    }

    /// Current batch version, for health reporting.
    pub fn batch_version(&self) -> u64 {
        self.source.snapshot().version
    }

    pub fn slots(&self) -> &[BoxSlot] {
        &self.slots
    }

    pub fn visible_boxes(&self) -> usize {
        self.slots.iter().filter(|slot| slot.visible).count()
    }

    /// Release everything: detach the source and hide all slots, as on
    /// unmount.
    pub fn teardown(&mut self) {
        self.set_enabled(false);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::detect::Detection;

    /// Source whose batch and version the test mutates directly. The shared
    /// handle lets a test change the batch without bumping the version.
    #[derive(Clone)]
    struct ScriptedSource {
        state: Arc<Mutex<ScriptedState>>,
    }

    struct ScriptedState {
        detections: Vec<Detection>,
        version: u64,
        enabled_calls: u32,
        disabled_calls: u32,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(ScriptedState {
                    detections: Vec::new(),
                    version: 0,
                    enabled_calls: 0,
                    disabled_calls: 0,
                })),
            }
        }

        fn publish(&self, detections: Vec<Detection>) {
            let mut state = self.state.lock().unwrap();
            state.version += 1;
            state.detections = detections;
        }

        fn mutate_without_version_bump(&self, detections: Vec<Detection>) {
            self.state.lock().unwrap().detections = detections;
        }

        fn disabled_calls(&self) -> u32 {
            self.state.lock().unwrap().disabled_calls
        }
    }

    impl DetectionSource for ScriptedSource {
        fn on_enabled(&mut self) {
            let mut state = self.state.lock().unwrap();
            state.enabled_calls += 1;
            state.detections.clear();
            state.version = 0;
        }

        fn on_disabled(&mut self) {
            self.state.lock().unwrap().disabled_calls += 1;
        }

        fn pump(&mut self, _now: Instant) {}

        fn snapshot(&self) -> BatchSnapshot {
            let state = self.state.lock().unwrap();
            BatchSnapshot {
                detections: Arc::from(state.detections.clone()),
                version: state.version,
            }
        }
    }

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection { x1, y1, x2, y2 }
    }

    fn enabled_renderer(view: ViewSize) -> (OverlayRenderer, ScriptedSource) {
        let source = ScriptedSource::new();
        let mut renderer =
            OverlayRenderer::new(Box::new(source.clone()), OverlayOptions::default());
        renderer.set_view_size(view);
        renderer.set_enabled(true);
        (renderer, source)
    }

    #[test]
    fn arena_caps_rendered_boxes_and_hides_the_rest() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(640.0, 640.0));

        let many: Vec<Detection> = (0..30)
            .map(|i| det(i as f32, i as f32, i as f32 + 10.0, i as f32 + 10.0))
            .collect();
        source.publish(many);
        renderer.on_frame(Instant::now());

        assert_eq!(renderer.slots().len(), MAX_RENDER_BOXES);
        assert_eq!(renderer.visible_boxes(), MAX_RENDER_BOXES);

        // Shrinking the batch hides the tail slots in place.
        source.publish(vec![det(0.0, 0.0, 10.0, 10.0); 3]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 3);
        assert!(renderer.slots()[3..].iter().all(|slot| !slot.visible));
    }

    #[test]
    fn unchanged_version_skips_the_redraw() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(320.0, 320.0));

        source.publish(vec![det(100.0, 50.0, 500.0, 300.0)]);
        renderer.on_frame(Instant::now());
        let drawn = renderer.slots()[0];
        assert!(drawn.visible);

        // Same version, different content: the tick must not repaint.
        source.mutate_without_version_bump(vec![det(0.0, 0.0, 640.0, 640.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.slots()[0], drawn);

        // A version bump paints the new content.
        source.publish(vec![det(0.0, 0.0, 640.0, 640.0)]);
        renderer.on_frame(Instant::now());
        assert_ne!(renderer.slots()[0], drawn);
    }

    #[test]
    fn invalid_view_defers_the_draw_without_consuming_the_version() {
        let source = ScriptedSource::new();
        let mut renderer =
            OverlayRenderer::new(Box::new(source.clone()), OverlayOptions::default());
        renderer.set_enabled(true);

        // Batch arrives before the first layout pass.
        source.publish(vec![det(100.0, 50.0, 500.0, 300.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 0);

        // First valid layout paints that same batch, no new version needed.
        renderer.set_view_size(ViewSize::new(320.0, 320.0));
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 1);
        assert_eq!(
            renderer.slots()[0],
            BoxSlot {
                visible: true,
                left: 50.0,
                top: 25.0,
                width: 200.0,
                height: 125.0
            }
        );
    }

    #[test]
    fn layout_change_remaps_the_current_batch() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(320.0, 320.0));

        source.publish(vec![det(100.0, 50.0, 500.0, 300.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.slots()[0].left, 50.0);

        // Same batch version; the resize alone forces a remap at full scale.
        renderer.set_view_size(ViewSize::new(640.0, 640.0));
        renderer.on_frame(Instant::now());
        assert_eq!(
            renderer.slots()[0],
            BoxSlot {
                visible: true,
                left: 100.0,
                top: 50.0,
                width: 400.0,
                height: 250.0
            }
        );
    }

    #[test]
    fn disable_hides_slots_immediately_and_releases_the_source() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(320.0, 320.0));

        source.publish(vec![det(100.0, 50.0, 500.0, 300.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 1);

        renderer.set_enabled(false);
        assert_eq!(renderer.visible_boxes(), 0);
        assert_eq!(source.disabled_calls(), 1);

        // Ticks while disabled change nothing even if batches keep landing.
        source.publish(vec![det(0.0, 0.0, 100.0, 100.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 0);
    }

    #[test]
    fn reenable_starts_from_an_empty_batch() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(320.0, 320.0));

        source.publish(vec![det(100.0, 50.0, 500.0, 300.0)]);
        renderer.on_frame(Instant::now());
        renderer.set_enabled(false);
        renderer.set_enabled(true);

        // The pre-disable batch must not replay.
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 0);

        source.publish(vec![det(0.0, 0.0, 64.0, 64.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 1);
    }

    #[test]
    fn empty_batch_clears_previous_boxes() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(320.0, 320.0));

        source.publish(vec![det(100.0, 50.0, 500.0, 300.0)]);
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 1);

        source.publish(Vec::new());
        renderer.on_frame(Instant::now());
        assert_eq!(renderer.visible_boxes(), 0);
    }

    #[test]
    fn teardown_is_idempotent() {
        let (mut renderer, source) = enabled_renderer(ViewSize::new(320.0, 320.0));

        renderer.teardown();
        renderer.teardown();
        assert_eq!(source.disabled_calls(), 1);
        assert!(!renderer.is_enabled());
    }
}
