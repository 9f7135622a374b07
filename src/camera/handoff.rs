//! Frame hand-off.
//!
//! `FrameSource` owns the capture-to-inference seam. It is responsible for:
//! - Resolving the configured facing to a camera URI and keeping a connected
//!   `CameraSource` for it
//! - Binding a fresh plugin instance whenever the facing changes
//! - Handing captured frames to the plugin, throttled to the inference cap
//!
//! It MUST NOT:
//! - Hand frames off while inactive or while detection is disabled
//! - Call a plugin that failed to bind (the camera keeps running; frames
//!   simply are not handed off)
//! - Copy pixel data on the hand-off path (`FrameHandle` only)

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use super::device::{DeviceRegistry, Facing};
use super::source::{CameraSettings, CameraSource};
use super::throttle::FpsGate;
use crate::detect::{FramePlugin, PluginHost, PluginInit};

/// What one capture cycle produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The source is not active; nothing was captured.
    Inactive,
    /// No camera is registered for the current facing.
    NoDevice,
    /// The camera had no frame ready yet.
    NoFrame,
    /// A frame was captured; `handed_off` says whether it reached the plugin.
    Captured { handed_off: bool },
}

/// Counters and camera status for health reporting.
#[derive(Clone, Debug)]
pub struct FrameSourceStats {
    pub frames_captured: u64,
    pub frames_handed_off: u64,
    pub frames_throttled: u64,
    pub camera_uri: Option<String>,
    pub camera_healthy: bool,
}

pub struct FrameSource {
    registry: DeviceRegistry,
    host: PluginHost,
    plugin_name: String,
    capture: CameraSettings,
    facing: Facing,
    camera: Option<CameraSource>,
    plugin: Option<Arc<dyn FramePlugin>>,
    gate: FpsGate,
    is_active: bool,
    detection_enabled: bool,
    frames_captured: u64,
    frames_handed_off: u64,
    frames_throttled: u64,
}

impl FrameSource {
    pub fn new(
        registry: DeviceRegistry,
        host: PluginHost,
        plugin_name: &str,
        capture: CameraSettings,
        facing: Facing,
        max_inference_fps: u32,
    ) -> Result<Self> {
        let mut source = Self {
            registry,
            host,
            plugin_name: plugin_name.to_string(),
            capture,
            facing,
            camera: None,
            plugin: None,
            gate: FpsGate::new(max_inference_fps),
            is_active: true,
            detection_enabled: false,
            frames_captured: 0,
            frames_handed_off: 0,
            frames_throttled: 0,
        };
        source.rebind()?;
        Ok(source)
    }

    /// Re-resolve the camera and plugin for the current facing.
    ///
    /// A missing device is not an error: the source idles on `NoDevice`
    /// until the facing changes to one that is registered.
    fn rebind(&mut self) -> Result<()> {
        self.camera = match self.registry.resolve(self.facing) {
            Some(uri) => {
                let mut camera = CameraSource::new(uri, self.capture.clone())?;
                camera.connect()?;
                Some(camera)
            }
            None => {
                log::warn!(
                    "FrameSource: no {} camera registered; idling",
                    self.facing
                );
                None
            }
        };
        self.plugin = self.host.bind(&self.plugin_name, PluginInit { facing: self.facing });
        if self.plugin.is_none() {
            log::warn!(
                "FrameSource: plugin '{}' not registered; frames will not be handed off",
                self.plugin_name
            );
        }
        self.gate.reset();
        Ok(())
    }

    /// Run one capture cycle: pull the next frame if one is due, and hand it
    /// to the plugin when detection is enabled and the throttle permits.
    pub fn process_next(&mut self, now: Instant) -> Result<FrameOutcome> {
        if !self.is_active {
            return Ok(FrameOutcome::Inactive);
        }
        let Some(camera) = self.camera.as_mut() else {
            return Ok(FrameOutcome::NoDevice);
        };
        let Some(frame) = camera.next_frame(now)? else {
            return Ok(FrameOutcome::NoFrame);
        };
        self.frames_captured += 1;

        let handed_off = match self.plugin.as_ref() {
            Some(plugin) if self.detection_enabled => {
                if self.gate.try_permit(now) {
                    plugin.call(&frame.handle());
                    self.frames_handed_off += 1;
                    true
                } else {
                    self.frames_throttled += 1;
                    false
                }
            }
            _ => false,
        };
        Ok(FrameOutcome::Captured { handed_off })
    }

    /// Pause or resume the whole source. While inactive, nothing is captured.
    pub fn set_active(&mut self, active: bool) {
        if self.is_active != active {
            self.is_active = active;
            log::info!(
                "FrameSource: {}",
                if active { "activated" } else { "deactivated" }
            );
        }
    }

    /// Gate the hand-off. The camera keeps capturing either way; disabled
    /// means frames stop at the source.
    pub fn set_detection_enabled(&mut self, enabled: bool) {
        if self.detection_enabled != enabled {
            self.detection_enabled = enabled;
            self.gate.reset();
            log::info!(
                "FrameSource: detection hand-off {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    /// Switch cameras. Reconnects the device and rebinds the plugin for the
    /// new facing.
    pub fn set_facing(&mut self, facing: Facing) -> Result<()> {
        if self.facing == facing {
            return Ok(());
        }
        self.facing = facing;
        log::info!("FrameSource: switching to {} camera", facing);
        self.rebind()
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }

    pub fn stats(&self) -> FrameSourceStats {
        FrameSourceStats {
            frames_captured: self.frames_captured,
            frames_handed_off: self.frames_handed_off,
            frames_throttled: self.frames_throttled,
            camera_uri: self.camera.as_ref().map(|c| c.stats().uri),
            camera_healthy: self.camera.as_ref().map_or(false, CameraSource::is_healthy),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
