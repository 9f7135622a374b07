//! Camera source dispatch.
//!
//! `CameraSource` is the capture boundary for one device URI:
//! - `stub://` URIs run the synthetic backend (tests, demo, CI)
//! - device paths run V4L2 capture (feature `camera-v4l2`)
//!
//! The camera layer is responsible for:
//! - Opening and configuring the device
//! - Producing `CameraFrame` instances with monotone sequence numbers
//! - Pacing capture to the configured rate
//!
//! The camera layer MUST NOT:
//! - Talk to detection plugins (that is the hand-off's job)
//! - Queue frames; a frame that is not consumed this tick is gone

use anyhow::Result;
use std::time::Instant;

use super::synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
use super::v4l2::V4l2Camera;
use crate::frame::CameraFrame;

/// Capture settings shared by all camera backends.
///
/// The device URI is not part of the settings; it comes from the
/// `DeviceRegistry` per facing.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    /// Capture rate (frames per second).
    pub capture_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// How long the source may go without a frame before it is unhealthy.
    pub health_grace_secs: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            capture_fps: 30,
            width: 640,
            height: 480,
            health_grace_secs: 10,
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub uri: String,
}

/// Camera capture source for one device URI.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    V4l2(V4l2Camera),
}

impl CameraSource {
    pub fn new(uri: &str, settings: CameraSettings) -> Result<Self> {
        if uri.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(uri, settings)),
            })
        } else {
            #[cfg(feature = "camera-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::V4l2(V4l2Camera::new(uri, settings)?),
                })
            }
            #[cfg(not(feature = "camera-v4l2"))]
            {
                anyhow::bail!(
                    "device '{}' requires the camera-v4l2 feature (stub:// runs everywhere)",
                    uri
                )
            }
        }
    }

    /// Open the device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.connect(),
        }
    }

    /// Capture the next frame, if one is due at `now`.
    ///
    /// `Ok(None)` means the source is paced and no frame is due; it is not an
    /// error and not a health problem by itself.
    pub fn next_frame(&mut self, now: Instant) -> Result<Option<CameraFrame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(now),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.next_frame(now),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.is_healthy(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::V4l2(camera) => camera.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stub_settings() -> CameraSettings {
        CameraSettings {
            capture_fps: 30,
            width: 640,
            height: 480,
            health_grace_secs: 10,
        }
    }

    #[test]
    fn stub_uri_selects_synthetic_backend() -> Result<()> {
        let mut source = CameraSource::new("stub://test", stub_settings())?;
        source.connect()?;

        let frame = source
            .next_frame(Instant::now())?
            .ok_or_else(|| anyhow::anyhow!("frame missing"))?;
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert!(source.is_healthy());

        Ok(())
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn device_path_requires_capture_feature() {
        assert!(CameraSource::new("/dev/video0", stub_settings()).is_err());
    }

    #[test]
    fn stats_count_captured_frames() -> Result<()> {
        let mut source = CameraSource::new("stub://test", stub_settings())?;
        source.connect()?;
        let start = Instant::now();

        source.next_frame(start)?;
        source.next_frame(start + Duration::from_millis(40))?;
        source.next_frame(start + Duration::from_millis(41))?; // not due

        let stats = source.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.uri, "stub://test");
        Ok(())
    }
}
