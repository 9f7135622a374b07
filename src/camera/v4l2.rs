//! V4L2 camera backend.
//!
//! Real local capture for device-path URIs (e.g. `/dev/video0`), enabled by
//! the `camera-v4l2` feature. The device paces delivery itself once
//! `capture_fps` is applied through driver parameters, so `next_frame` pulls
//! whatever the mmap stream has ready instead of gating on the caller clock.

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::source::{CameraSettings, CameraStats};
use crate::frame::CameraFrame;

pub(crate) struct V4l2Camera {
    uri: String,
    settings: CameraSettings,
    state: Option<CaptureState>,
    sequence: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct CaptureState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub(crate) fn new(uri: &str, settings: CameraSettings) -> Result<Self> {
        Ok(Self {
            uri: uri.to_string(),
            active_width: settings.width,
            active_height: settings.height,
            settings,
            state: None,
            sequence: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    pub(crate) fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.uri)
            .with_context(|| format!("open v4l2 device {}", self.uri))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("CameraSource: failed to set format on {}: {}", self.uri, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.settings.capture_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.capture_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("CameraSource: failed to set fps on {}: {}", self.uri, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = CaptureStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{})",
            self.uri,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    pub(crate) fn next_frame(&mut self, now: Instant) -> Result<Option<CameraFrame>> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;

        self.sequence += 1;
        self.last_frame_at = Some(now);

        Ok(Some(CameraFrame::new(
            buf.to_vec(),
            self.active_width,
            self.active_height,
            self.sequence,
            now,
        )))
    }

    pub(crate) fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    pub(crate) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.sequence,
            uri: self.uri.clone(),
        }
    }

    fn health_grace(&self) -> Duration {
        Duration::from_secs(self.settings.health_grace_secs.max(1))
    }
}
