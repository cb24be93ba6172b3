//! Dual-loop scheduler.
//!
//! The reflex loop handles every frame at camera rate; the cognitive loop
//! wakes only on a narration trigger. The two loops share the history store
//! and the speech dispatcher and nothing else, so a slow captioner or
//! narrator never delays hazard alerts.
//!
//! Frames and triggers travel through bounded queues that drop on overflow:
//! the newest frame matters more than a complete one.

pub mod alert;
pub mod cognitive;
mod queue;
pub(crate) mod reflex;

pub use alert::{Alert, AlertConfig, AlertGate};
pub use cognitive::NarrationReport;

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::detect::ObjectTracker;
use crate::frame::Frame;
use crate::hazard::{HazardClassifier, HazardConfig};
use crate::history::{HistoryStore, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_MISSING_FRAMES};
use crate::ingest::FrameSource;
use crate::movement::{MovementClassifier, MovementConfig};
use crate::narrate::{Narrator, SceneCaptioner};
use crate::speech::SpeechDispatcher;
use crate::worker::join_with_timeout;

use cognitive::CognitiveLoop;
use queue::{DropSender, FrameJob};
use reflex::ReflexLoop;

/// Pause before retrying a failed frame read.
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Capture rate for `run_capture`.
    pub reflex_fps: u32,
    pub frame_queue_capacity: usize,
    pub frame_poll: Duration,
    pub trigger_poll: Duration,
    pub join_timeout: Duration,
    /// Stale-object cleanup runs on frame ids divisible by this.
    pub cleanup_interval_frames: u64,
    pub max_missing_frames: u64,
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reflex_fps: 30,
            frame_queue_capacity: 5,
            frame_poll: Duration::from_millis(100),
            trigger_poll: Duration::from_millis(500),
            join_timeout: Duration::from_secs(2),
            cleanup_interval_frames: 30,
            max_missing_frames: DEFAULT_MAX_MISSING_FRAMES,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Default)]
pub(crate) struct Counters {
    pub frames_submitted: AtomicU64,
    pub frames_processed: AtomicU64,
    pub frame_errors: AtomicU64,
    pub alerts: AtomicU64,
    pub narrations: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub frames_submitted: u64,
    pub frames_dropped: u64,
    pub frames_processed: u64,
    pub frame_errors: u64,
    pub alerts_dispatched: u64,
    pub narrations_completed: u64,
    pub triggers_dropped: u64,
    pub tracked_objects: usize,
    pub speech_pending: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct Scheduler {
    config: SchedulerConfig,
    alerts: AlertConfig,
    classifier: Arc<HazardClassifier>,
    movement: Mutex<Option<MovementClassifier>>,
    store: Arc<HistoryStore>,
    speech: Arc<SpeechDispatcher>,
    running: Arc<AtomicBool>,
    state: Mutex<SchedulerState>,
    counters: Arc<Counters>,
    next_frame_id: AtomicU64,
    epoch: Instant,
    current: Arc<Mutex<Option<FrameJob>>>,
    frame_tx: DropSender<FrameJob>,
    frame_rx: Mutex<Option<Receiver<FrameJob>>>,
    trigger_tx: DropSender<()>,
    trigger_rx: Mutex<Option<Receiver<()>>>,
    workers: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        alerts: AlertConfig,
        hazards: HazardConfig,
        movement: MovementConfig,
        speech: Arc<SpeechDispatcher>,
    ) -> Self {
        let (frame_tx, frame_rx) = queue::bounded(config.frame_queue_capacity);
        let (trigger_tx, trigger_rx) = queue::bounded(1);
        Self {
            store: Arc::new(HistoryStore::new(config.history_capacity)),
            config,
            alerts,
            classifier: Arc::new(HazardClassifier::new(hazards)),
            movement: Mutex::new(Some(MovementClassifier::new(movement))),
            speech,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(SchedulerState::Idle),
            counters: Arc::new(Counters::default()),
            next_frame_id: AtomicU64::new(0),
            epoch: Instant::now(),
            current: Arc::new(Mutex::new(None)),
            frame_tx,
            frame_rx: Mutex::new(Some(frame_rx)),
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    pub fn speech(&self) -> &Arc<SpeechDispatcher> {
        &self.speech
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start both loops. Each model handle moves into exactly one loop.
    pub fn start(
        &self,
        mut tracker: Box<dyn ObjectTracker>,
        captioner: Box<dyn SceneCaptioner>,
        narrator: Box<dyn Narrator>,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != SchedulerState::Idle {
            return Err(anyhow!("scheduler cannot start from state {:?}", *state));
        }
        tracker
            .warm_up()
            .with_context(|| format!("warm up {} tracker", tracker.name()))?;
        if !narrator.check_connection() {
            log::warn!(
                "narrator '{}' not reachable; narration will fall back to captions",
                narrator.name()
            );
        }

        let frames = lock(&self.frame_rx)
            .take()
            .ok_or_else(|| anyhow!("frame queue already consumed"))?;
        let triggers = lock(&self.trigger_rx)
            .take()
            .ok_or_else(|| anyhow!("trigger queue already consumed"))?;
        let movement = lock(&self.movement).take().unwrap_or_default();

        self.running.store(true, Ordering::SeqCst);

        let reflex = ReflexLoop {
            running: self.running.clone(),
            store: self.store.clone(),
            classifier: self.classifier.clone(),
            gate: AlertGate::new(self.alerts.clone()),
            speech: self.speech.clone(),
            counters: self.counters.clone(),
            config: self.config.clone(),
        };
        let cognitive = CognitiveLoop {
            running: self.running.clone(),
            store: self.store.clone(),
            movement,
            current: self.current.clone(),
            speech: self.speech.clone(),
            counters: self.counters.clone(),
            config: self.config.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("reflex".into())
            .spawn(move || reflex.run(tracker, frames))
            .context("spawn reflex loop")
            .and_then(|reflex| {
                lock(&self.workers).push(("reflex loop", reflex));
                std::thread::Builder::new()
                    .name("cognitive".into())
                    .spawn(move || cognitive.run(captioner, narrator, triggers))
                    .context("spawn cognitive loop")
            });
        match spawned {
            Ok(cognitive) => {
                lock(&self.workers).push(("cognitive loop", cognitive));
                *state = SchedulerState::Running;
                log::info!(
                    "scheduler running (queue capacity {}, cleanup every {} frames)",
                    self.config.frame_queue_capacity,
                    self.config.cleanup_interval_frames
                );
                Ok(())
            }
            Err(e) => {
                drop(state);
                self.stop();
                Err(e)
            }
        }
    }

    /// Hand a frame to the reflex loop without blocking.
    ///
    /// The frame also becomes the snapshot the cognitive loop narrates.
    /// Returns the assigned frame id, or `None` when the frame was dropped.
    pub fn submit_frame(&self, frame: Frame) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        let frame_id = self.next_frame_id.fetch_add(1, Ordering::SeqCst) + 1;
        let job = FrameJob {
            frame_id,
            timestamp: self.epoch.elapsed().as_secs_f64(),
            frame: Arc::new(frame),
        };
        self.counters.frames_submitted.fetch_add(1, Ordering::Relaxed);
        *lock(&self.current) = Some(job.clone());
        if self.frame_tx.offer(job) {
            Some(frame_id)
        } else {
            log::debug!("frame queue full; dropped frame {}", frame_id);
            None
        }
    }

    /// Request a narration. Dropped while one is already pending.
    pub fn trigger(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        let accepted = self.trigger_tx.offer(());
        if !accepted {
            log::debug!("narration already pending; trigger dropped");
        }
        accepted
    }

    /// Capture loop on the calling thread. Pulls frames at `reflex_fps` until
    /// the scheduler stops or the source ends.
    pub fn run_capture(&self, source: &mut dyn FrameSource) -> Result<()> {
        source.connect().context("connect frame source")?;
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.config.reflex_fps.max(1)));
        let mut last_health_log = Instant::now();

        while self.is_running() {
            let started = Instant::now();
            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.submit_frame(frame);
                }
                Ok(None) => {
                    log::info!("frame source reached end of stream");
                    break;
                }
                Err(e) => {
                    log::warn!("frame read failed: {:#}", e);
                    std::thread::sleep(READ_RETRY_DELAY);
                    continue;
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = source.stats();
                log::info!(
                    "source health={} frames={} rewinds={} source={}",
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.rewinds,
                    stats.source
                );
                last_health_log = Instant::now();
            }

            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        source.release();
        Ok(())
    }

    /// Stop both loops and the speech dispatcher. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.state);
            match *state {
                SchedulerState::Stopping | SchedulerState::Stopped => return,
                SchedulerState::Idle | SchedulerState::Running => *state = SchedulerState::Stopping,
            }
        }
        log::info!("stopping scheduler");
        self.running.store(false, Ordering::SeqCst);
        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        for (name, handle) in workers {
            join_with_timeout(handle, self.config.join_timeout, name);
        }
        self.speech.shutdown();
        *lock(&self.state) = SchedulerState::Stopped;
        log::info!("scheduler stopped");
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            frames_submitted: c.frames_submitted.load(Ordering::Relaxed),
            frames_dropped: self.frame_tx.dropped(),
            frames_processed: c.frames_processed.load(Ordering::Relaxed),
            frame_errors: c.frame_errors.load(Ordering::Relaxed),
            alerts_dispatched: c.alerts.load(Ordering::Relaxed),
            narrations_completed: c.narrations.load(Ordering::Relaxed),
            triggers_dropped: self.trigger_tx.dropped(),
            tracked_objects: self.store.len(),
            speech_pending: self.speech.pending(),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrate::{FallbackNarrator, StaticCaptioner};
    use crate::speech::{LogAudio, SpeechConfig};
    use crate::detect::ScriptedTracker;

    fn scheduler(config: SchedulerConfig) -> Scheduler {
        let speech = Arc::new(SpeechDispatcher::spawn(
            Arc::new(LogAudio),
            SpeechConfig::default(),
        ));
        Scheduler::new(
            config,
            AlertConfig::default(),
            HazardConfig::default(),
            MovementConfig::default(),
            speech,
        )
    }

    fn start(scheduler: &Scheduler) -> Result<()> {
        scheduler.start(
            Box::new(ScriptedTracker::passing_car(30)),
            Box::new(StaticCaptioner::default()),
            Box::new(FallbackNarrator),
        )
    }

    #[test]
    fn lifecycle_transitions() -> Result<()> {
        let scheduler = scheduler(SchedulerConfig::default());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.submit_frame(Frame::blank(4, 4)?).is_none());
        assert!(!scheduler.trigger());

        start(&scheduler)?;
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(start(&scheduler).is_err());

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        scheduler.stop();
        assert!(!scheduler.speech().is_running());
        assert!(start(&scheduler).is_err());
        Ok(())
    }

    #[test]
    fn overflowing_frame_queue_drops_frames() -> Result<()> {
        let scheduler = scheduler(SchedulerConfig {
            frame_queue_capacity: 2,
            ..SchedulerConfig::default()
        });
        // Running without loops so nothing drains the queue.
        scheduler.running.store(true, Ordering::SeqCst);
        assert_eq!(scheduler.submit_frame(Frame::blank(4, 4)?), Some(1));
        assert_eq!(scheduler.submit_frame(Frame::blank(4, 4)?), Some(2));
        assert_eq!(scheduler.submit_frame(Frame::blank(4, 4)?), None);
        assert!(scheduler.trigger());
        assert!(!scheduler.trigger());

        let stats = scheduler.stats();
        assert_eq!(stats.frames_submitted, 3);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.triggers_dropped, 1);
        Ok(())
    }
}
