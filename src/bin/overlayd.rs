//! overlayd - Live Detection Overlay daemon
//!
//! This daemon:
//! 1. Captures frames from the configured camera (synthetic or V4L2)
//! 2. Hands frames to the inference plugin at the configured bounded rate
//! 3. Carries detection batches over the configured channel (push or poll)
//! 4. Runs the draw tick that keeps the slot arena in sync
//! 5. Logs pipeline health every few seconds

use anyhow::Result;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use overlay_kernel::{OverlayPipeline, OverlaydConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = OverlaydConfig::load()?;
    let mut pipeline = OverlayPipeline::new(&config)?;

    log::info!(
        "overlayd {} running. facing={} channel={}",
        env!("CARGO_PKG_VERSION"),
        config.camera.facing,
        config.detection.channel
    );
    log::info!(
        "capture {}x{}@{}fps, inference cap {} fps, view {}x{}",
        config.camera.width,
        config.camera.height,
        config.camera.capture_fps,
        overlay_kernel::coerce_max_fps(config.detection.max_inference_fps),
        config.overlay.view_width,
        config.overlay.view_height
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    let mut last_health_log = Instant::now();

    loop {
        if rx.try_recv().is_ok() {
            log::info!("shutdown signal received, stopping pipeline...");
            break;
        }

        pipeline.tick(Instant::now())?;

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = pipeline.stats();
            log::info!(
                "camera health={} captured={} handed_off={} throttled={} uri={}",
                stats.frames.camera_healthy,
                stats.frames.frames_captured,
                stats.frames.frames_handed_off,
                stats.frames.frames_throttled,
                stats.frames.camera_uri.as_deref().unwrap_or("-")
            );
            log::info!(
                "overlay batch_version={} boxes={}",
                stats.batch_version,
                stats.boxes_visible
            );
            last_health_log = Instant::now();
        }

        // Draw tick at ~60 Hz; the camera and throttle pace themselves.
        std::thread::sleep(Duration::from_millis(16));
    }

    pipeline.shutdown();
    Ok(())
}
