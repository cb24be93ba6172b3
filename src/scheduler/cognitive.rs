//! Cognitive loop: on-demand narration of the most recent frame.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::queue::FrameJob;
use super::reflex::panic_message;
use super::{Counters, SchedulerConfig};
use crate::frame::Frame;
use crate::history::HistoryStore;
use crate::movement::MovementClassifier;
use crate::narrate::{caption_fallback, Narrator, SceneCaptioner};
use crate::speech::{SpeechDispatcher, SpeechPriority};

/// Result of narrating one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NarrationReport {
    pub caption: String,
    pub movements: Vec<String>,
    /// Narrator output; `None` when narration was unavailable.
    pub narration: Option<String>,
    /// What gets spoken: the narration, or the caption fallback.
    pub text: String,
    pub processing_ms: f64,
}

/// Caption a frame, describe tracked movement and narrate.
pub(crate) fn describe_scene(
    captioner: &mut dyn SceneCaptioner,
    narrator: &mut dyn Narrator,
    movement: &MovementClassifier,
    store: &HistoryStore,
    frame: &Frame,
) -> Result<NarrationReport> {
    let started = Instant::now();
    let caption = captioner
        .caption(frame)
        .with_context(|| format!("{} captioner failed", captioner.name()))?;
    log::debug!("scene: {}", caption);

    let movements = movement.analyze_all(&store.get_all());
    log::debug!("movements: {:?}", movements);

    let narration = narrator.narrate(&caption, &movements);
    let text = match &narration {
        Some(text) => text.clone(),
        None => {
            log::warn!("narration unavailable; speaking caption");
            caption_fallback(&caption)
        }
    };
    Ok(NarrationReport {
        caption,
        movements,
        narration,
        text,
        processing_ms: started.elapsed().as_secs_f64() * 1000.0,
    })
}

pub(crate) struct CognitiveLoop {
    pub running: Arc<AtomicBool>,
    pub store: Arc<HistoryStore>,
    pub movement: MovementClassifier,
    pub current: Arc<Mutex<Option<FrameJob>>>,
    pub speech: Arc<SpeechDispatcher>,
    pub counters: Arc<Counters>,
    pub config: SchedulerConfig,
}

impl CognitiveLoop {
    pub fn run(
        self,
        mut captioner: Box<dyn SceneCaptioner>,
        mut narrator: Box<dyn Narrator>,
        triggers: Receiver<()>,
    ) {
        log::info!(
            "cognitive loop started (captioner: {}, narrator: {})",
            captioner.name(),
            narrator.name()
        );
        while self.running.load(Ordering::SeqCst) {
            match triggers.recv_timeout(self.config.trigger_poll) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
            log::info!("cognitive loop triggered");

            let snapshot = self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            let Some(job) = snapshot else {
                log::warn!("narration requested before any frame arrived");
                continue;
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                describe_scene(
                    captioner.as_mut(),
                    narrator.as_mut(),
                    &self.movement,
                    &self.store,
                    &job.frame,
                )
            }))
            .unwrap_or_else(|payload| Err(anyhow!("panicked: {}", panic_message(&*payload))));
            match outcome {
                Ok(report) => {
                    log::info!("narration (frame {}): {}", job.frame_id, report.text);
                    if self.speech.enqueue(&report.text, SpeechPriority::Low) {
                        self.counters.narrations.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(e) => log::error!("cognitive loop: {:#}", e),
            }
        }
        log::info!("cognitive loop stopped");
    }
}
