//! pathsensed - hazard monitor and narration daemon
//!
//! This daemon:
//! 1. Captures frames from the configured source at the reflex rate
//! 2. Tracks objects and warns about approaching hazards (reflex loop)
//! 3. Narrates the scene when a line is entered on stdin (cognitive loop)
//! 4. Speaks through the log until a real audio device is wired in

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use pathsense::narrate::Narrator;
use pathsense::{
    open_source, FallbackNarrator, LogAudio, PathsenseConfig, Scheduler, ScriptedTracker,
    SpeechDispatcher, SpeechPriority, StaticCaptioner,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// A car closing on the center of the frame.
    Approaching,
    /// A car crossing the frame.
    Passing,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PATHSENSE_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source override (`stub://name` or an image directory).
    #[arg(long)]
    source: Option<String>,
    /// Stop at end of stream instead of looping.
    #[arg(long)]
    no_loop: bool,
    /// Scripted tracker scenario used in place of a detector.
    #[arg(long, value_enum, default_value = "approaching")]
    scenario: Scenario,
    /// Frames per scenario cycle.
    #[arg(long, default_value_t = 90)]
    scenario_frames: u64,
    /// Caption returned for every narrated frame.
    #[arg(long, default_value = "A street with parked cars and a sidewalk.")]
    caption: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = PathsenseConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.spec = source;
    }
    if args.no_loop {
        cfg.source.looping = false;
    }

    let speech = Arc::new(SpeechDispatcher::spawn(
        Arc::new(LogAudio),
        cfg.speech.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        cfg.scheduler.clone(),
        cfg.alerts.clone(),
        cfg.hazard.clone(),
        cfg.movement.clone(),
        speech.clone(),
    ));

    let tracker = match args.scenario {
        Scenario::Approaching => ScriptedTracker::approaching_car(args.scenario_frames),
        Scenario::Passing => ScriptedTracker::passing_car(args.scenario_frames),
    };
    scheduler.start(
        Box::new(tracker),
        Box::new(StaticCaptioner::new(args.caption)),
        build_narrator(&cfg)?,
    )?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");
    {
        let scheduler = scheduler.clone();
        std::thread::spawn(move || {
            if rx.recv().is_ok() {
                log::info!("shutdown signal received, stopping...");
                scheduler.stop();
            }
        });
    }
    {
        let scheduler = scheduler.clone();
        std::thread::spawn(move || read_triggers(&scheduler));
    }

    speech.enqueue("Path sense ready.", SpeechPriority::Low);
    log::info!(
        "pathsensed running. source={} loop={} (press Enter to narrate, q to quit)",
        cfg.source.spec,
        cfg.source.looping
    );

    let mut source = open_source(
        &cfg.source.spec,
        cfg.source.width,
        cfg.source.height,
        cfg.source.looping,
    )?;
    let result = scheduler.run_capture(source.as_mut());
    scheduler.stop();

    let stats = scheduler.stats();
    log::info!(
        "frames submitted={} dropped={} processed={} errors={} alerts={} narrations={}",
        stats.frames_submitted,
        stats.frames_dropped,
        stats.frames_processed,
        stats.frame_errors,
        stats.alerts_dispatched,
        stats.narrations_completed
    );
    result
}

fn build_narrator(cfg: &PathsenseConfig) -> Result<Box<dyn Narrator>> {
    let Some(url) = cfg.narrator.url.as_deref() else {
        log::info!("no narrator configured; narration falls back to captions");
        return Ok(Box::new(FallbackNarrator));
    };
    ollama_narrator(url, cfg)
}

#[cfg(feature = "narrator-ollama")]
fn ollama_narrator(url: &str, cfg: &PathsenseConfig) -> Result<Box<dyn Narrator>> {
    use pathsense::narrate::{OllamaConfig, OllamaNarrator};

    let narrator = OllamaNarrator::new(OllamaConfig {
        url: url.to_string(),
        model: cfg.narrator.model.clone(),
        timeout: cfg.narrator.timeout,
        ..OllamaConfig::default()
    })?;
    log::info!("narrator: {} ({})", url, cfg.narrator.model);
    Ok(Box::new(narrator))
}

#[cfg(not(feature = "narrator-ollama"))]
fn ollama_narrator(url: &str, _cfg: &PathsenseConfig) -> Result<Box<dyn Narrator>> {
    Err(anyhow::anyhow!(
        "narrator url {} configured but pathsensed was built without the narrator-ollama feature",
        url
    ))
}

/// Each stdin line requests a narration; `q` stops the daemon.
fn read_triggers(scheduler: &Scheduler) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if !scheduler.is_running() {
            break;
        }
        if line.trim().eq_ignore_ascii_case("q") {
            scheduler.stop();
            break;
        }
        if !scheduler.trigger() {
            log::info!("narration already in progress");
        }
    }
}
