//! Camera capture and frame hand-off.
//!
//! This module is responsible for:
//! - Resolving camera facings to device URIs (`device`)
//! - Capturing frames from synthetic or V4L2 backends (`source`)
//! - Throttling and handing frames to the inference plugin (`handoff`)
//!
//! It MUST NOT:
//! - Interpret detection results (that is `detect`'s job)
//! - Draw anything (that is `overlay`'s job)

pub mod device;
pub mod handoff;
pub mod source;
mod synthetic;
pub mod throttle;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use device::{DeviceRegistry, Facing};
pub use handoff::{FrameOutcome, FrameSource, FrameSourceStats};
pub use source::{CameraSettings, CameraSource, CameraStats};
pub use throttle::{coerce_max_fps, FpsGate, DEFAULT_MAX_INFERENCE_FPS};
