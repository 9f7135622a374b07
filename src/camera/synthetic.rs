//! Synthetic camera backend.
//!
//! Backs `stub://` device URIs so the daemon, the demo, and every test can
//! run without camera hardware. Frames are paced at the configured capture
//! rate against the caller-supplied clock and carry a deterministic-but-
//! varying pixel pattern, so checksums differ frame to frame.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

use super::source::{CameraSettings, CameraStats};
use crate::frame::CameraFrame;

pub(crate) struct SyntheticCamera {
    uri: String,
    settings: CameraSettings,
    rng: StdRng,
    sequence: u64,
    next_due: Option<Instant>,
}

impl SyntheticCamera {
    pub(crate) fn new(uri: &str, settings: CameraSettings) -> Self {
        // Seed from the URI so front/back stubs produce distinct streams.
        let seed = uri
            .bytes()
            .fold(0u64, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte.into()));
        Self {
            uri: uri.to_string(),
            settings,
            rng: StdRng::seed_from_u64(seed),
            sequence: 0,
            next_due: None,
        }
    }

    /// Synthetic cameras are always "connected".
    pub(crate) fn connect(&mut self) -> Result<()> {
        log::info!("CameraSource: connected to {} (synthetic)", self.uri);
        Ok(())
    }

    /// Produce the next frame if one is due at `now`.
    ///
    /// Pacing honors `capture_fps`; between due instants this returns
    /// `Ok(None)`, which the frame source reports as a no-frame tick.
    pub(crate) fn next_frame(&mut self, now: Instant) -> Result<Option<CameraFrame>> {
        if let Some(due) = self.next_due {
            if now < due {
                return Ok(None);
            }
        }
        self.next_due = Some(now + self.capture_interval());

        self.sequence += 1;
        let pixels = self.generate_pixels();
        Ok(Some(CameraFrame::new(
            pixels,
            self.settings.width,
            self.settings.height,
            self.sequence,
            now,
        )))
    }

    /// Fill a frame with a moving pattern plus seeded noise.
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.settings.width * self.settings.height * 3) as usize; // RGB
        let drift = self.rng.gen_range(0..256u32) as u64;

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.sequence + drift) % 256) as u8;
        }
        // Sequence stamp: frame content stays distinct even when the drift
        // cancels the pattern shift.
        let stamp = self.sequence.to_le_bytes();
        let len = stamp.len().min(pixels.len());
        pixels[..len].copy_from_slice(&stamp[..len]);
        pixels
    }

    pub(crate) fn is_healthy(&self) -> bool {
        true
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.sequence,
            uri: self.uri.clone(),
        }
    }

    fn capture_interval(&self) -> Duration {
        let fps = self.settings.capture_fps.max(1);
        Duration::from_secs_f64(1.0 / f64::from(fps))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_camera() -> SyntheticCamera {
        SyntheticCamera::new("stub://test", CameraSettings::default())
    }

    #[test]
    fn produces_paced_frames() -> Result<()> {
        let mut camera = stub_camera();
        camera.connect()?;
        let start = Instant::now();

        let first = camera.next_frame(start)?;
        assert!(first.is_some());

        // 30fps default: a frame 1ms later is not due yet.
        assert!(camera.next_frame(start + Duration::from_millis(1))?.is_none());
        assert!(camera.next_frame(start + Duration::from_millis(40))?.is_some());

        Ok(())
    }

    #[test]
    fn frames_carry_monotone_sequence_numbers() -> Result<()> {
        let mut camera = stub_camera();
        camera.connect()?;
        let start = Instant::now();

        let first = camera
            .next_frame(start)?
            .ok_or_else(|| anyhow::anyhow!("first frame missing"))?;
        let second = camera
            .next_frame(start + Duration::from_millis(50))?
            .ok_or_else(|| anyhow::anyhow!("second frame missing"))?;

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        Ok(())
    }

    #[test]
    fn successive_frames_vary() -> Result<()> {
        let mut camera = stub_camera();
        camera.connect()?;
        let start = Instant::now();

        let first = camera
            .next_frame(start)?
            .ok_or_else(|| anyhow::anyhow!("first frame missing"))?;
        let second = camera
            .next_frame(start + Duration::from_millis(50))?
            .ok_or_else(|| anyhow::anyhow!("second frame missing"))?;

        assert_ne!(first.checksum(), second.checksum());
        Ok(())
    }
}
