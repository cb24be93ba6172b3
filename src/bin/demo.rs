//! demo - scripted end-to-end run of the hazard and narration pipeline
//!
//! Replays a scripted scene through `Engine` and prints one JSON line per
//! frame that raised a hazard, followed by a narration and a status line.
//! With `--live` the same scene runs through the threaded scheduler instead.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;

use pathsense::{
    Engine, EngineConfig, FallbackNarrator, Frame, LogAudio, Scheduler, SchedulerConfig,
    ScriptedTracker, SpeechConfig, SpeechDispatcher, StaticCaptioner,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    Approaching,
    Passing,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of frames to replay.
    #[arg(long, default_value_t = 90)]
    frames: u64,
    /// Frames per second used to timestamp the replay.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    #[arg(long, value_enum, default_value = "approaching")]
    scenario: Scenario,
    /// Caption used for the final narration.
    #[arg(long, default_value = "A street with a car ahead.")]
    caption: String,
    /// Run through the threaded scheduler in real time.
    #[arg(long)]
    live: bool,
}

fn tracker(scenario: Scenario, frames: u64) -> ScriptedTracker {
    match scenario {
        Scenario::Approaching => ScriptedTracker::approaching_car(frames),
        Scenario::Passing => ScriptedTracker::passing_car(frames),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }

    if args.live {
        run_live(&args)
    } else {
        run_replay(&args)
    }
}

fn run_replay(args: &Args) -> Result<()> {
    let mut engine = Engine::new(
        EngineConfig::default(),
        Box::new(tracker(args.scenario, args.frames)),
        Box::new(StaticCaptioner::new(args.caption.clone())),
        Box::new(FallbackNarrator),
    )?;
    let frame = Frame::blank(64, 36)?.with_label("demo");

    for i in 0..args.frames {
        let timestamp = i as f64 / f64::from(args.fps);
        let report = engine.process_frame(&frame, Some(i + 1), Some(timestamp))?;
        if !report.hazards.is_empty() {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    let narration = engine.narrate(&frame)?;
    println!("{}", serde_json::to_string(&narration)?);
    println!("{}", serde_json::to_string(&engine.status())?);
    Ok(())
}

fn run_live(args: &Args) -> Result<()> {
    let speech = Arc::new(SpeechDispatcher::spawn(
        Arc::new(LogAudio),
        SpeechConfig::default(),
    ));
    let scheduler = Scheduler::new(
        SchedulerConfig {
            reflex_fps: args.fps,
            ..SchedulerConfig::default()
        },
        Default::default(),
        Default::default(),
        Default::default(),
        speech,
    );
    scheduler.start(
        Box::new(tracker(args.scenario, args.frames)),
        Box::new(StaticCaptioner::new(args.caption.clone())),
        Box::new(FallbackNarrator),
    )?;

    let interval = Duration::from_secs_f64(1.0 / f64::from(args.fps));
    for _ in 0..args.frames {
        scheduler.submit_frame(Frame::blank(64, 36)?);
        std::thread::sleep(interval);
    }
    scheduler.trigger();
    // Give the cognitive loop a poll interval to pick the trigger up.
    std::thread::sleep(scheduler.config().trigger_poll * 2);
    scheduler.stop();

    let stats = scheduler.stats();
    println!(
        "{}",
        serde_json::json!({
            "frames_submitted": stats.frames_submitted,
            "frames_dropped": stats.frames_dropped,
            "frames_processed": stats.frames_processed,
            "alerts_dispatched": stats.alerts_dispatched,
            "narrations_completed": stats.narrations_completed,
        })
    );
    Ok(())
}
