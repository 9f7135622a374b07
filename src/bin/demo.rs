//! demo - end-to-end synthetic run for the Live Detection Overlay kernel

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::{Duration, Instant};

use overlay_kernel::{
    coerce_max_fps, ChannelKind, Facing, OverlayPipeline, OverlaydConfig, PipelineStats, ViewSize,
};

/// Ticks per simulated second; 8ms steps outpace both the camera and the
/// inference cap so pacing is exercised, not the tick rate.
const TICKS_PER_SECOND: u64 = 125;
const TICK: Duration = Duration::from_millis(8);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration in simulated seconds (the demo runs on a synthetic clock).
    #[arg(long, default_value_t = 4)]
    seconds: u64,
    /// Capture rate of the synthetic camera.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Inference cap in frames per second.
    #[arg(long, default_value_t = 8.0)]
    max_fps: f64,
    /// Detection channel flavor: push or poll.
    #[arg(long, default_value = "push")]
    channel: String,
    /// Starting camera facing: front or back.
    #[arg(long, default_value = "front")]
    facing: String,
    /// Optional deterministic seed for the synthetic plugin.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    if args.seconds == 0 {
        return Err(anyhow!("seconds must be >= 1"));
    }
    let channel: ChannelKind = args.channel.parse()?;
    let facing: Facing = args.facing.parse()?;

    stage("build pipeline");
    let mut config = OverlaydConfig::default();
    config.camera.facing = facing;
    config.camera.capture_fps = args.fps;
    config.detection.max_inference_fps = args.max_fps;
    config.detection.channel = channel;
    if let Some(seed) = args.seed {
        config.detection.synthetic_seed = seed;
    }
    let mut pipeline = OverlayPipeline::new(&config)?;

    let start = Instant::now();
    let half = args.seconds.saturating_mul(TICKS_PER_SECOND) / 2;
    let total = args.seconds.saturating_mul(TICKS_PER_SECOND);

    stage("run capture + overlay");
    for i in 0..half {
        pipeline.tick(start + TICK * i as u32)?;
    }

    stage("switch facing + resize view");
    let other = match facing {
        Facing::Front => Facing::Back,
        Facing::Back => Facing::Front,
    };
    pipeline.set_facing(other)?;
    pipeline.set_view_size(ViewSize::new(1280.0, 720.0));
    for i in half..total {
        pipeline.tick(start + TICK * i as u32)?;
    }

    stage("verify overlay state");
    let stats = pipeline.stats();
    let verify_result = verify_run(&stats, args.seconds, args.max_fps);

    pipeline.shutdown();

    println!("demo summary:");
    println!("  simulated seconds: {}", args.seconds);
    println!("  channel: {}", channel);
    println!(
        "  facing: {} -> {}",
        facing,
        other
    );
    println!("  frames captured: {}", stats.frames.frames_captured);
    println!("  frames handed off: {}", stats.frames.frames_handed_off);
    println!("  frames throttled: {}", stats.frames.frames_throttled);
    println!("  batch version: {}", stats.batch_version);
    println!("  boxes visible: {}", stats.boxes_visible);
    println!(
        "  verify: {}",
        if verify_result.is_ok() { "OK" } else { "FAIL" }
    );
    println!("next steps:");
    println!("  cargo run --bin overlayd");
    println!("  cargo run --bin demo -- --channel poll");

    verify_result
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}

fn verify_run(stats: &PipelineStats, seconds: u64, max_fps: f64) -> Result<()> {
    if stats.frames.frames_captured == 0 {
        return Err(anyhow!("no frames captured"));
    }
    let cap = coerce_max_fps(max_fps) as u64;
    let limit = seconds.saturating_mul(cap) + 1;
    if stats.frames.frames_handed_off > limit {
        return Err(anyhow!(
            "hand-off exceeded the inference cap: {} frames against a limit of {}",
            stats.frames.frames_handed_off,
            limit
        ));
    }
    if stats.batch_version == 0 {
        return Err(anyhow!("no detection batches arrived"));
    }
    if stats.boxes_visible == 0 {
        return Err(anyhow!("no boxes rendered"));
    }
    Ok(())
}
