//! Frame containment layer.
//!
//! This module defines the two frame views the pipeline uses:
//!
//! - `CameraFrame`: one captured frame. Pixel bytes are private.
//! - `FrameHandle`: opaque descriptor handed to detection plugins.
//!
//! Plugins observe frames, they do not read them back: the hand-off passes a
//! `FrameHandle` only, so pixel buffers never cross the plugin boundary. The
//! plugin runs on its own execution context and returns results through the
//! detection channel, not through the frame.

use std::time::Instant;

// ----------------------------------------------------------------------------
// CameraFrame: captured frame with private pixels
// ----------------------------------------------------------------------------

/// One captured frame. Bytes are private; there is no `.as_bytes()` and no
/// `AsRef<[u8]>`. Consumers outside the camera layer see dimensions, sequence
/// number, and a cheap content checksum.
pub struct CameraFrame {
    /// Private pixel data. MUST NOT be exposed via any public API.
    data: Vec<u8>,

    /// Frame dimensions.
    pub width: u32,
    pub height: u32,

    /// Monotone per-source sequence number, starting at 1.
    pub sequence: u64,

    /// Capture instant (for stats and health, not exported to plugins' logs).
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Create a new frame. Called only by the camera layer.
    pub(crate) fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
        captured_at: Instant,
    ) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            captured_at,
        }
    }

    /// Opaque descriptor for the plugin hand-off.
    pub fn handle(&self) -> FrameHandle {
        FrameHandle {
            sequence: self.sequence,
            width: self.width,
            height: self.height,
            captured_at: self.captured_at,
        }
    }

    /// Raw byte length (for stats, not content access).
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// FNV-1a over the pixel payload. Used to check that successive synthetic
    /// frames actually vary; not a cryptographic digest.
    pub fn checksum(&self) -> u64 {
        let mut hash = 0xcbf2_9ce4_8422_2325u64;
        for &byte in &self.data {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }
}

// ----------------------------------------------------------------------------
// FrameHandle: what plugins receive
// ----------------------------------------------------------------------------

/// Opaque frame descriptor passed to `FramePlugin::call`.
///
/// A handle carries enough to identify and size the frame, nothing more.
/// There is no path from a handle back to pixel data.
#[derive(Clone, Copy, Debug)]
pub struct FrameHandle {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: Instant,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(data: &[u8], sequence: u64) -> CameraFrame {
        CameraFrame::new(data.to_vec(), 640, 480, sequence, Instant::now())
    }

    #[test]
    fn handle_carries_frame_metadata() {
        let frame = make_frame(b"pixels", 7);
        let handle = frame.handle();

        assert_eq!(handle.sequence, 7);
        assert_eq!(handle.width, 640);
        assert_eq!(handle.height, 480);
    }

    #[test]
    fn checksum_tracks_content() {
        let a = make_frame(b"frame-a", 1);
        let b = make_frame(b"frame-b", 2);
        let a_again = make_frame(b"frame-a", 3);

        assert_ne!(a.checksum(), b.checksum());
        assert_eq!(a.checksum(), a_again.checksum());
    }

    #[test]
    fn byte_len_reports_payload_size() {
        let frame = make_frame(b"12345", 1);
        assert_eq!(frame.byte_len(), 5);
    }
}
