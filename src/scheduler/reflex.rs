//! Reflex loop: track, record and classify every frame, alerting through the
//! speech dispatcher when a hazard clears the alert gate.

use anyhow::{anyhow, Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use super::alert::AlertGate;
use super::queue::FrameJob;
use super::{Counters, SchedulerConfig};
use crate::detect::{resolve_object_id, DetectionPoint, ObjectTracker};
use crate::frame::Frame;
use crate::hazard::{Hazard, HazardClassifier};
use crate::history::HistoryStore;
use crate::speech::{SpeechDispatcher, SpeechPriority};

/// Detections and hazards for one frame.
#[derive(Clone, Debug)]
pub(crate) struct Observation {
    pub detections: Vec<DetectionPoint>,
    pub hazards: Vec<Hazard>,
}

/// Track one frame, write every detection into the store and classify.
///
/// The store is updated before classification so the current detection is
/// part of its own trajectory.
pub(crate) fn observe(
    tracker: &mut dyn ObjectTracker,
    store: &HistoryStore,
    classifier: &HazardClassifier,
    frame: &Frame,
    frame_id: u64,
    timestamp: f64,
) -> Result<Observation> {
    let detections = tracker
        .track(frame, frame_id, timestamp)
        .with_context(|| format!("{} tracker failed on frame {}", tracker.name(), frame_id))?;
    for detection in &detections {
        store.add_detection(resolve_object_id(detection), detection.clone());
    }
    let hazards = classifier.check_hazards(&detections, store);
    Ok(Observation { detections, hazards })
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) struct ReflexLoop {
    pub running: Arc<AtomicBool>,
    pub store: Arc<HistoryStore>,
    pub classifier: Arc<HazardClassifier>,
    pub gate: AlertGate,
    pub speech: Arc<SpeechDispatcher>,
    pub counters: Arc<Counters>,
    pub config: SchedulerConfig,
}

impl ReflexLoop {
    pub fn run(mut self, mut tracker: Box<dyn ObjectTracker>, frames: Receiver<FrameJob>) {
        log::info!("reflex loop started (tracker: {})", tracker.name());
        while self.running.load(Ordering::SeqCst) {
            let job = match frames.recv_timeout(self.config.frame_poll) {
                Ok(job) => job,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.step(tracker.as_mut(), &job)))
                .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))));
            if let Err(e) = outcome {
                self.counters.frame_errors.fetch_add(1, Ordering::Relaxed);
                log::error!("reflex loop: skipping frame {}: {:#}", job.frame_id, e);
            }
        }
        log::info!("reflex loop stopped");
    }

    fn step(&mut self, tracker: &mut dyn ObjectTracker, job: &FrameJob) -> Result<()> {
        let observation = observe(
            tracker,
            &self.store,
            &self.classifier,
            &job.frame,
            job.frame_id,
            job.timestamp,
        )?;
        self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);

        for hazard in &observation.hazards {
            log::debug!(
                "frame {}: {} hazard {} (object {}): {}",
                job.frame_id,
                hazard.priority.as_str(),
                hazard.class_name,
                hazard.object_id,
                hazard.reason
            );
        }

        let frame_cfg = self.classifier.config();
        if let Some(alert) = self.gate.evaluate(
            &observation.hazards,
            &self.store,
            frame_cfg.frame_width,
            frame_cfg.frame_height,
            Instant::now(),
        ) {
            log::warn!("HAZARD: {} (object {})", alert.message, alert.object_id);
            if alert.beep {
                let config = self.gate.config();
                self.speech
                    .play_tone(config.beep_frequency_hz, config.beep_duration);
            }
            if self.speech.enqueue(&alert.message, SpeechPriority::High) {
                self.counters.alerts.fetch_add(1, Ordering::Relaxed);
            }
        }

        let interval = self.config.cleanup_interval_frames;
        if interval > 0 && job.frame_id % interval == 0 {
            let removed = self
                .store
                .cleanup_stale(job.frame_id, self.config.max_missing_frames);
            if removed > 0 {
                log::debug!("frame {}: dropped {} stale objects", job.frame_id, removed);
            }
        }
        Ok(())
    }
}
