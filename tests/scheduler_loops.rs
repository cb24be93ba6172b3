use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use pathsense::narrate::Narrator;
use pathsense::{
    AlertConfig, AudioOutput, DetectionPoint, FallbackNarrator, Frame, HazardConfig,
    MovementConfig, ObjectTracker, SceneCaptioner, Scheduler, SchedulerConfig, SchedulerState,
    ScriptedTracker, SpeechConfig, SpeechDispatcher, StaticCaptioner, SyntheticConfig,
    SyntheticSource,
};

#[derive(Default)]
struct Recorder {
    spoken: Mutex<Vec<String>>,
    tones: Mutex<Vec<u32>>,
}

impl AudioOutput for Recorder {
    fn play_tone(&self, freq_hz: u32, duration: Duration) -> Result<()> {
        self.tones.lock().unwrap().push(freq_hz);
        std::thread::sleep(duration);
        Ok(())
    }

    fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct CannedNarrator(&'static str);

impl Narrator for CannedNarrator {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn narrate(&mut self, _caption: &str, movements: &[String]) -> Option<String> {
        Some(format!("{} ({} moving)", self.0, movements.len()))
    }
}

/// Scripted tracker that panics on one frame and fails on another.
struct FaultyTracker {
    inner: ScriptedTracker,
    panic_on: u64,
    fail_on: u64,
}

impl ObjectTracker for FaultyTracker {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn track(&mut self, frame: &Frame, frame_id: u64, timestamp: f64) -> Result<Vec<DetectionPoint>> {
        if frame_id == self.panic_on {
            panic!("tracker crashed on frame {}", frame_id);
        }
        if frame_id == self.fail_on {
            return Err(anyhow!("tracker lost frame {}", frame_id));
        }
        self.inner.track(frame, frame_id, timestamp)
    }
}

/// Captioner that panics the first time it is asked.
struct FlakyCaptioner {
    calls: u32,
}

impl SceneCaptioner for FlakyCaptioner {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn caption(&mut self, _frame: &Frame) -> Result<String> {
        self.calls += 1;
        if self.calls == 1 {
            panic!("captioner crashed");
        }
        Ok("A busy sidewalk.".to_string())
    }
}

fn scheduler(audio: Arc<Recorder>) -> Scheduler {
    let speech = Arc::new(SpeechDispatcher::spawn(audio, SpeechConfig::default()));
    Scheduler::new(
        SchedulerConfig {
            frame_queue_capacity: 128,
            ..SchedulerConfig::default()
        },
        AlertConfig::default(),
        HazardConfig::default(),
        MovementConfig::default(),
        speech,
    )
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn repeated_hazard_from_one_identity_is_spoken_once() -> Result<()> {
    let audio = Arc::new(Recorder::default());
    let scheduler = scheduler(audio.clone());
    scheduler.start(
        Box::new(ScriptedTracker::approaching_car(90)),
        Box::new(StaticCaptioner::new("A street with a car ahead.")),
        Box::new(FallbackNarrator),
    )?;

    for _ in 0..90 {
        assert!(scheduler.submit_frame(Frame::blank(16, 9)?).is_some());
    }
    assert!(wait_until(|| scheduler.stats().frames_processed == 90));
    assert!(wait_until(|| scheduler.speech().spoken() == 1));

    let stats = scheduler.stats();
    assert_eq!(stats.alerts_dispatched, 1);
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!(stats.frame_errors, 0);

    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(
        *audio.spoken.lock().unwrap(),
        vec!["STOP! Car in front of you".to_string()]
    );
    assert_eq!(*audio.tones.lock().unwrap(), vec![800]);
    Ok(())
}

#[test]
fn trigger_speaks_caption_when_narrator_unavailable() -> Result<()> {
    let audio = Arc::new(Recorder::default());
    let scheduler = scheduler(audio.clone());
    scheduler.start(
        Box::new(ScriptedTracker::passing_car(30)),
        Box::new(StaticCaptioner::new("A quiet crossing.")),
        Box::new(FallbackNarrator),
    )?;

    // Nothing to narrate yet.
    assert!(scheduler.trigger());
    std::thread::sleep(Duration::from_millis(700));
    assert_eq!(scheduler.speech().spoken(), 0);

    for _ in 0..10 {
        scheduler.submit_frame(Frame::blank(16, 9)?);
    }
    assert!(wait_until(|| scheduler.stats().frames_processed == 10));
    assert!(scheduler.trigger());
    assert!(wait_until(|| scheduler.stats().narrations_completed == 1));
    assert!(wait_until(|| scheduler.speech().spoken() == 1));

    scheduler.stop();
    assert_eq!(
        *audio.spoken.lock().unwrap(),
        vec!["Scene: A quiet crossing.".to_string()]
    );
    Ok(())
}

#[test]
fn trigger_speaks_narration_with_movements() -> Result<()> {
    let audio = Arc::new(Recorder::default());
    let scheduler = scheduler(audio.clone());
    scheduler.start(
        Box::new(ScriptedTracker::passing_car(30)),
        Box::new(StaticCaptioner::default()),
        Box::new(CannedNarrator("A car passes in front of you.")),
    )?;

    for _ in 0..10 {
        scheduler.submit_frame(Frame::blank(16, 9)?);
    }
    assert!(wait_until(|| scheduler.stats().frames_processed == 10));
    assert!(scheduler.trigger());
    assert!(wait_until(|| scheduler.speech().spoken() == 1));

    scheduler.stop();
    assert_eq!(
        *audio.spoken.lock().unwrap(),
        vec!["A car passes in front of you. (1 moving)".to_string()]
    );
    Ok(())
}

#[test]
fn capture_runs_until_end_of_stream() -> Result<()> {
    let audio = Arc::new(Recorder::default());
    let scheduler = scheduler(audio);
    scheduler.start(
        Box::new(ScriptedTracker::passing_car(30)),
        Box::new(StaticCaptioner::default()),
        Box::new(FallbackNarrator),
    )?;

    let mut source = SyntheticSource::new(SyntheticConfig {
        url: "stub://test".to_string(),
        width: 16,
        height: 9,
        frames: Some(12),
    })?;
    scheduler.run_capture(&mut source)?;
    assert!(wait_until(|| scheduler.stats().frames_processed == 12));
    assert_eq!(scheduler.stats().frames_submitted, 12);

    scheduler.stop();
    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(!scheduler.trigger());
    Ok(())
}

#[test]
fn tracker_failures_skip_only_their_frame() -> Result<()> {
    let audio = Arc::new(Recorder::default());
    let scheduler = scheduler(audio.clone());
    scheduler.start(
        Box::new(FaultyTracker {
            inner: ScriptedTracker::approaching_car(90),
            panic_on: 3,
            fail_on: 5,
        }),
        Box::new(StaticCaptioner::default()),
        Box::new(FallbackNarrator),
    )?;

    for _ in 0..90 {
        assert!(scheduler.submit_frame(Frame::blank(16, 9)?).is_some());
    }
    assert!(wait_until(|| scheduler.stats().frames_processed == 88));
    assert!(wait_until(|| scheduler.speech().spoken() == 1));

    let stats = scheduler.stats();
    assert_eq!(stats.frame_errors, 2);
    assert_eq!(stats.alerts_dispatched, 1);
    assert_eq!(scheduler.state(), SchedulerState::Running);

    scheduler.stop();
    assert_eq!(
        *audio.spoken.lock().unwrap(),
        vec!["STOP! Car in front of you".to_string()]
    );
    Ok(())
}

#[test]
fn captioner_panic_does_not_end_narration() -> Result<()> {
    let audio = Arc::new(Recorder::default());
    let scheduler = scheduler(audio.clone());
    scheduler.start(
        Box::new(ScriptedTracker::passing_car(30)),
        Box::new(FlakyCaptioner { calls: 0 }),
        Box::new(FallbackNarrator),
    )?;

    scheduler.submit_frame(Frame::blank(16, 9)?);
    assert!(wait_until(|| scheduler.stats().frames_processed == 1));

    assert!(scheduler.trigger());
    std::thread::sleep(Duration::from_millis(700));
    assert_eq!(scheduler.stats().narrations_completed, 0);

    assert!(scheduler.trigger());
    assert!(wait_until(|| scheduler.stats().narrations_completed == 1));
    assert!(wait_until(|| scheduler.speech().spoken() == 1));

    scheduler.stop();
    assert_eq!(
        *audio.spoken.lock().unwrap(),
        vec!["Scene: A busy sidewalk.".to_string()]
    );
    Ok(())
}
