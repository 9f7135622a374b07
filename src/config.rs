use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::camera::{Facing, DEFAULT_MAX_INFERENCE_FPS};
use crate::detect::{POLL_INTERVAL_MS, YOLO_PLUGIN};
use crate::overlay::{MAX_RENDER_BOXES, MODEL_SIZE};

const DEFAULT_CAPTURE_FPS: u32 = 30;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_HEALTH_GRACE_SECS: u64 = 10;
const DEFAULT_SYNTHETIC_SEED: u64 = 17;
const DEFAULT_VIEW_WIDTH: f32 = 640.0;
const DEFAULT_VIEW_HEIGHT: f32 = 480.0;

#[derive(Debug, Deserialize, Default)]
struct OverlaydConfigFile {
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    facing: Option<Facing>,
    devices: Option<HashMap<String, String>>,
    capture_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    health_grace_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    enabled: Option<bool>,
    max_inference_fps: Option<f64>,
    channel: Option<ChannelKind>,
    poll_interval_ms: Option<u64>,
    plugin: Option<String>,
    synthetic_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    model_size: Option<f32>,
    max_render_boxes: Option<usize>,
    view_width: Option<f32>,
    view_height: Option<f32>,
}

/// Which detection channel flavor carries results to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Push,
    Poll,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Push => "push",
            ChannelKind::Poll => "poll",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(ChannelKind::Push),
            "poll" => Ok(ChannelKind::Poll),
            other => Err(anyhow!("unknown channel '{}' (expected push|poll)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlaydConfig {
    pub camera: CaptureSettings,
    pub detection: DetectionSettings,
    pub overlay: OverlaySettings,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub facing: Facing,
    /// Facing name -> device URI. Empty means the built-in stub devices.
    pub devices: HashMap<String, String>,
    pub capture_fps: u32,
    pub width: u32,
    pub height: u32,
    pub health_grace_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub enabled: bool,
    /// Raw inference cap; coerced to a whole fps >= 1 at pipeline build.
    pub max_inference_fps: f64,
    pub channel: ChannelKind,
    pub poll_interval_ms: u64,
    pub plugin: String,
    pub synthetic_seed: u64,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub model_size: f32,
    pub max_render_boxes: usize,
    pub view_width: f32,
    pub view_height: f32,
}

impl OverlaydConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OVERLAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlaydConfigFile) -> Self {
        let camera = CaptureSettings {
            facing: file
                .camera
                .as_ref()
                .and_then(|camera| camera.facing)
                .unwrap_or(Facing::Front),
            devices: file
                .camera
                .as_ref()
                .and_then(|camera| camera.devices.clone())
                .unwrap_or_default(),
            capture_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.capture_fps)
                .unwrap_or(DEFAULT_CAPTURE_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
            health_grace_secs: file
                .camera
                .and_then(|camera| camera.health_grace_secs)
                .unwrap_or(DEFAULT_HEALTH_GRACE_SECS),
        };
        let detection = DetectionSettings {
            enabled: file
                .detection
                .as_ref()
                .and_then(|detection| detection.enabled)
                .unwrap_or(true),
            max_inference_fps: file
                .detection
                .as_ref()
                .and_then(|detection| detection.max_inference_fps)
                .unwrap_or(DEFAULT_MAX_INFERENCE_FPS as f64),
            channel: file
                .detection
                .as_ref()
                .and_then(|detection| detection.channel)
                .unwrap_or(ChannelKind::Push),
            poll_interval_ms: file
                .detection
                .as_ref()
                .and_then(|detection| detection.poll_interval_ms)
                .unwrap_or(POLL_INTERVAL_MS),
            plugin: file
                .detection
                .as_ref()
                .and_then(|detection| detection.plugin.clone())
                .unwrap_or_else(|| YOLO_PLUGIN.to_string()),
            synthetic_seed: file
                .detection
                .and_then(|detection| detection.synthetic_seed)
                .unwrap_or(DEFAULT_SYNTHETIC_SEED),
        };
        let overlay = OverlaySettings {
            model_size: file
                .overlay
                .as_ref()
                .and_then(|overlay| overlay.model_size)
                .unwrap_or(MODEL_SIZE),
            max_render_boxes: file
                .overlay
                .as_ref()
                .and_then(|overlay| overlay.max_render_boxes)
                .unwrap_or(MAX_RENDER_BOXES),
            view_width: file
                .overlay
                .as_ref()
                .and_then(|overlay| overlay.view_width)
                .unwrap_or(DEFAULT_VIEW_WIDTH),
            view_height: file
                .overlay
                .and_then(|overlay| overlay.view_height)
                .unwrap_or(DEFAULT_VIEW_HEIGHT),
        };
        Self {
            camera,
            detection,
            overlay,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(facing) = std::env::var("OVERLAY_FACING") {
            if !facing.trim().is_empty() {
                self.camera.facing = facing.parse()?;
            }
        }
        if let Ok(channel) = std::env::var("OVERLAY_CHANNEL") {
            if !channel.trim().is_empty() {
                self.detection.channel = channel.parse()?;
            }
        }
        if let Ok(max_fps) = std::env::var("OVERLAY_MAX_FPS") {
            self.detection.max_inference_fps = max_fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_MAX_FPS must be a number"))?;
        }
        if let Ok(enabled) = std::env::var("OVERLAY_DETECTION_ENABLED") {
            self.detection.enabled = match enabled.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(anyhow!(
                        "OVERLAY_DETECTION_ENABLED must be a boolean, got '{}'",
                        other
                    ))
                }
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(self.overlay.model_size.is_finite() && self.overlay.model_size > 0.0) {
            return Err(anyhow!("overlay.model_size must be a positive number"));
        }
        if self.overlay.max_render_boxes == 0 {
            return Err(anyhow!("overlay.max_render_boxes must be at least 1"));
        }
        if self.camera.capture_fps == 0 {
            return Err(anyhow!("camera.capture_fps must be at least 1"));
        }
        if self.camera.health_grace_secs == 0 {
            return Err(anyhow!("camera.health_grace_secs must be at least 1"));
        }
        if self.detection.poll_interval_ms == 0 {
            return Err(anyhow!("detection.poll_interval_ms must be at least 1"));
        }
        if self.detection.plugin.trim().is_empty() {
            return Err(anyhow!("detection.plugin must not be empty"));
        }
        for key in self.camera.devices.keys() {
            key.parse::<Facing>()
                .map_err(|e| anyhow!("camera.devices has a bad key: {}", e))?;
        }
        Ok(())
    }

    /// Build the facing -> URI registry. An empty device table falls back to
    /// the built-in stub cameras so the daemon runs anywhere.
    pub fn device_registry(&self) -> Result<crate::camera::DeviceRegistry> {
        if self.camera.devices.is_empty() {
            return Ok(crate::camera::DeviceRegistry::with_defaults());
        }
        crate::camera::DeviceRegistry::from_map(&self.camera.devices)
    }
}

impl Default for OverlaydConfig {
    fn default() -> Self {
        Self::from_file(OverlaydConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<OverlaydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
