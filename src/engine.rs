//! Synchronous request/response entry points.
//!
//! `Engine` runs the same per-frame and narration steps as the scheduler's
//! loops, but on the caller's thread: one frame in, one report out. It holds
//! its own store and model handles, so it can be embedded behind any
//! transport without the scheduler.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Instant;

use crate::detect::{resolve_object_id, DetectionPoint, ObjectId, ObjectTracker};
use crate::frame::Frame;
use crate::hazard::{self, Hazard, HazardClassifier, HazardConfig};
use crate::history::{HistoryStore, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_MISSING_FRAMES};
use crate::movement::{MovementClassifier, MovementConfig};
use crate::narrate::{Narrator, SceneCaptioner};
use crate::scheduler::{cognitive, reflex};

pub use crate::scheduler::NarrationReport;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub hazard: HazardConfig,
    pub movement: MovementConfig,
    pub history_capacity: usize,
    pub cleanup_interval_frames: u64,
    pub max_missing_frames: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hazard: HazardConfig::default(),
            movement: MovementConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            cleanup_interval_frames: 30,
            max_missing_frames: DEFAULT_MAX_MISSING_FRAMES,
        }
    }
}

/// One detection as reported to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub object_id: ObjectId,
    pub track_id: Option<ObjectId>,
    pub class_name: String,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in pixels.
    pub bbox: [f64; 4],
    pub center: (f64, f64),
    pub area: f64,
}

impl From<&DetectionPoint> for DetectionSummary {
    fn from(point: &DetectionPoint) -> Self {
        let b = point.bbox();
        Self {
            object_id: resolve_object_id(point),
            track_id: point.track_id(),
            class_name: point.class_name().to_string(),
            confidence: point.confidence(),
            bbox: [b.x1, b.y1, b.x2, b.y2],
            center: point.center(),
            area: point.area(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame_id: u64,
    pub timestamp: f64,
    pub detections: Vec<DetectionSummary>,
    pub hazards: Vec<Hazard>,
    /// Warning text when the hazards call for one. Cooldowns are not applied.
    pub warning: Option<String>,
    pub processing_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub tracker: &'static str,
    pub captioner: &'static str,
    pub narrator: &'static str,
    pub narrator_available: bool,
    pub frames_processed: u64,
    pub narrations: u64,
    pub tracked_objects: usize,
    pub latest_frame: u64,
}

pub struct Engine {
    tracker: Box<dyn ObjectTracker>,
    captioner: Box<dyn SceneCaptioner>,
    narrator: Box<dyn Narrator>,
    store: HistoryStore,
    classifier: HazardClassifier,
    movement: MovementClassifier,
    config: EngineConfig,
    last_frame_id: u64,
    frames_processed: u64,
    narrations: u64,
    narrator_available: bool,
    epoch: Instant,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        mut tracker: Box<dyn ObjectTracker>,
        captioner: Box<dyn SceneCaptioner>,
        narrator: Box<dyn Narrator>,
    ) -> Result<Self> {
        tracker.warm_up()?;
        let narrator_available = narrator.check_connection();
        if !narrator_available {
            log::warn!("narrator {} unreachable; narration falls back to captions", narrator.name());
        }
        Ok(Self {
            tracker,
            captioner,
            narrator,
            store: HistoryStore::new(config.history_capacity),
            classifier: HazardClassifier::new(config.hazard.clone()),
            movement: MovementClassifier::new(config.movement.clone()),
            config,
            last_frame_id: 0,
            frames_processed: 0,
            narrations: 0,
            narrator_available,
            epoch: Instant::now(),
        })
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Track and classify one frame.
    ///
    /// Without an explicit id the frame gets the next one in sequence; without
    /// a timestamp it is stamped with seconds since the engine was created.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        frame_id: Option<u64>,
        timestamp: Option<f64>,
    ) -> Result<FrameReport> {
        let started = Instant::now();
        let frame_id = match frame_id {
            Some(id) => id,
            None => self
                .last_frame_id
                .checked_add(1)
                .ok_or_else(|| anyhow!("frame id sequence exhausted"))?,
        };
        let timestamp = timestamp.unwrap_or_else(|| self.epoch.elapsed().as_secs_f64());
        if !timestamp.is_finite() {
            return Err(anyhow!("frame timestamp must be finite"));
        }

        let observation = reflex::observe(
            self.tracker.as_mut(),
            &self.store,
            &self.classifier,
            frame,
            frame_id,
            timestamp,
        )?;
        self.last_frame_id = self.last_frame_id.max(frame_id);
        self.frames_processed += 1;

        let interval = self.config.cleanup_interval_frames;
        if interval > 0 && frame_id % interval == 0 {
            self.store
                .cleanup_stale(frame_id, self.config.max_missing_frames);
        }

        Ok(FrameReport {
            frame_id,
            timestamp,
            detections: observation.detections.iter().map(DetectionSummary::from).collect(),
            warning: hazard::warning_message(&observation.hazards),
            hazards: observation.hazards,
            processing_ms: started.elapsed().as_secs_f64() * 1000.0,
        })
    }

    /// Caption and narrate `frame` against the current history.
    pub fn narrate(&mut self, frame: &Frame) -> Result<NarrationReport> {
        let report = cognitive::describe_scene(
            self.captioner.as_mut(),
            self.narrator.as_mut(),
            &self.movement,
            &self.store,
            frame,
        )?;
        self.narrations += 1;
        self.narrator_available = report.narration.is_some();
        Ok(report)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            tracker: self.tracker.name(),
            captioner: self.captioner.name(),
            narrator: self.narrator.name(),
            narrator_available: self.narrator_available,
            frames_processed: self.frames_processed,
            narrations: self.narrations,
            tracked_objects: self.store.len(),
            latest_frame: self.store.latest_frame(),
        }
    }
}
