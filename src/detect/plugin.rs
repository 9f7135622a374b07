//! Inference plugin seam.
//!
//! The frame hand-off side only knows the `FramePlugin` trait: a named,
//! fire-and-forget `call` per permitted frame. Where results come out is the
//! channel's business (push event or pull accessor), not the caller's.
//!
//! `PluginHost` maps plugin names to factories so the hand-off can rebind a
//! fresh plugin instance per camera facing, the way the preprocess stage is
//! reinitialized when the capture device changes. The pull accessor is
//! registered at host level and shared across instances, so a rebind never
//! detaches an already-polling overlay.
//!
//! The host MUST NOT:
//! - Run inference itself (the synthetic plugin fabricates plausible output)
//! - Block the capture path: `call` is expected to return promptly

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use super::channel::{DetectionAccessor, DetectionFeed};
use crate::camera::Facing;
use crate::frame::FrameHandle;
use crate::overlay::MODEL_SIZE;

/// Name the frame hand-off binds to by default.
pub const YOLO_PLUGIN: &str = "yoloFramePreprocess";

/// Event the push channel listens on.
pub const DETECTION_EVENT: &str = "onYoloDetections";

/// Per-binding parameters handed to a plugin factory.
#[derive(Clone, Copy, Debug)]
pub struct PluginInit {
    pub facing: Facing,
}

/// One inference plugin instance, bound to a camera facing.
pub trait FramePlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Hand one frame to the plugin. Fire-and-forget: results surface through
    /// the detection channel, not the return path.
    fn call(&self, frame: &FrameHandle);
}

type PluginFactory = Box<dyn Fn(PluginInit) -> Arc<dyn FramePlugin> + Send + Sync>;

// ----------------------------------------------------------------------------
// PluginHost
// ----------------------------------------------------------------------------

struct HostEntry {
    factory: PluginFactory,
    accessor: Option<DetectionAccessor>,
}

/// Registry of plugin factories, keyed by plugin name.
pub struct PluginHost {
    entries: HashMap<String, HostEntry>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn(PluginInit) -> Arc<dyn FramePlugin> + Send + Sync + 'static,
    ) {
        self.entries.insert(
            name.to_string(),
            HostEntry {
                factory: Box::new(factory),
                accessor: None,
            },
        );
    }

    /// Register a plugin together with its pull accessor. The accessor reads
    /// the latest raw payload across instance rebinds.
    pub fn register_with_accessor(
        &mut self,
        name: &str,
        factory: impl Fn(PluginInit) -> Arc<dyn FramePlugin> + Send + Sync + 'static,
        accessor: DetectionAccessor,
    ) {
        self.entries.insert(
            name.to_string(),
            HostEntry {
                factory: Box::new(factory),
                accessor: Some(accessor),
            },
        );
    }

    /// Create a plugin instance for the given init, or `None` when the name
    /// is unregistered.
    pub fn bind(&self, name: &str, init: PluginInit) -> Option<Arc<dyn FramePlugin>> {
        self.entries.get(name).map(|entry| (entry.factory)(init))
    }

    pub fn accessor(&self, name: &str) -> Option<DetectionAccessor> {
        self.entries.get(name).and_then(|entry| entry.accessor.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Host with the synthetic YOLO plugin registered under `YOLO_PLUGIN`,
    /// emitting on `feed` and serving the pull accessor from a shared
    /// latest-payload slot.
    pub fn with_synthetic(feed: Arc<DetectionFeed>, seed: u64) -> Self {
        let latest: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));

        let mut host = Self::new();
        let factory_latest = Arc::clone(&latest);
        let accessor: DetectionAccessor = Arc::new(move || match latest.lock() {
            Ok(slot) => Ok(slot.clone()),
            Err(_) => anyhow::bail!("synthetic plugin latest-payload lock poisoned"),
        });
        host.register_with_accessor(
            YOLO_PLUGIN,
            move |init| {
                Arc::new(SyntheticYoloPlugin::new(
                    init,
                    Arc::clone(&feed),
                    Arc::clone(&factory_latest),
                    seed,
                ))
            },
            accessor,
        );
        host
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// SyntheticYoloPlugin
// ----------------------------------------------------------------------------

/// Deterministic stand-in for the YOLO preprocess plugin.
///
/// Each `call` advances a couple of wandering boxes in model space and
/// publishes them on both result paths: an `onYoloDetections` emission for
/// the push channel and the shared latest-payload slot for the pull accessor.
/// Useful for running the full pipeline with no camera and no model.
pub(crate) struct SyntheticYoloPlugin {
    init: PluginInit,
    feed: Arc<DetectionFeed>,
    latest: Arc<Mutex<Option<Value>>>,
    state: Mutex<WanderState>,
}

struct WanderState {
    rng: StdRng,
    boxes: Vec<WanderBox>,
}

struct WanderBox {
    cx: f32,
    cy: f32,
    half_w: f32,
    half_h: f32,
}

impl SyntheticYoloPlugin {
    pub(crate) fn new(
        init: PluginInit,
        feed: Arc<DetectionFeed>,
        latest: Arc<Mutex<Option<Value>>>,
        seed: u64,
    ) -> Self {
        // Distinct per facing so front/back overlays are visibly different.
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(match init.facing {
            Facing::Front => 0,
            Facing::Back => 1,
        }));
        let count = rng.gen_range(2..=3);
        let boxes = (0..count)
            .map(|_| WanderBox {
                cx: rng.gen_range(0.2..0.8) * MODEL_SIZE,
                cy: rng.gen_range(0.2..0.8) * MODEL_SIZE,
                half_w: rng.gen_range(0.05..0.15) * MODEL_SIZE,
                half_h: rng.gen_range(0.08..0.2) * MODEL_SIZE,
            })
            .collect();
        log::info!(
            "SyntheticYoloPlugin: bound for {} camera (seed {})",
            init.facing,
            seed
        );
        Self {
            init,
            feed,
            latest,
            state: Mutex::new(WanderState { rng, boxes }),
        }
    }

    fn step(&self) -> Vec<Value> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                log::warn!("SyntheticYoloPlugin: state lock poisoned; emitting nothing");
                return Vec::new();
            }
        };
        let WanderState { rng, boxes } = &mut *state;
        boxes
            .iter_mut()
            .map(|b| {
                b.cx = (b.cx + rng.gen_range(-8.0..8.0)).clamp(b.half_w, MODEL_SIZE - b.half_w);
                b.cy = (b.cy + rng.gen_range(-8.0..8.0)).clamp(b.half_h, MODEL_SIZE - b.half_h);
                json!({
                    "x1": b.cx - b.half_w,
                    "y1": b.cy - b.half_h,
                    "x2": b.cx + b.half_w,
                    "y2": b.cy + b.half_h,
                })
            })
            .collect()
    }
}

impl FramePlugin for SyntheticYoloPlugin {
    fn name(&self) -> &str {
        YOLO_PLUGIN
    }

    fn call(&self, _frame: &FrameHandle) {
        let detections = self.step();
        let count = detections.len();

        match self.latest.lock() {
            Ok(mut slot) => *slot = Some(Value::Array(detections.clone())),
            Err(_) => log::warn!("SyntheticYoloPlugin: latest-payload lock poisoned"),
        }
        self.feed
            .emit(DETECTION_EVENT, json!({ "detections": detections }));
        log::debug!(
            "SyntheticYoloPlugin: {} camera emitted {} boxes",
            self.init.facing,
            count
        );
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
