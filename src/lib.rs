//! pathsense
//!
//! A hazard monitor and scene narrator for a camera carried by a blind or
//! low-vision walker.
//!
//! # Architecture
//!
//! Two loops run side by side:
//!
//! 1. **Reflex loop** (camera rate): track objects, keep a bounded history per
//!    object, and raise an alert when something is both growing and closing
//!    on the center of the frame.
//! 2. **Cognitive loop** (on demand): caption the latest frame, describe how
//!    tracked objects are moving, and narrate the result.
//!
//! Both loops speak through one dispatcher that puts hazard warnings ahead of
//! narration and never talks over an alert tone.
//!
//! # Module Structure
//!
//! - `detect`: detections, identities and the tracker interface
//! - `history`: bounded per-object trajectories
//! - `kinematics`, `hazard`, `movement`: pixel-space reasoning over trajectories
//! - `scheduler`: the two loops, alert gating and bounded queues
//! - `speech`: prioritized speech and tone output
//! - `narrate`: captioner and narrator interfaces
//! - `frame`, `ingest`: frames and frame sources
//! - `engine`: synchronous per-request entry points
//! - `config`: file and environment configuration

pub mod config;
pub mod detect;
pub mod engine;
pub mod frame;
pub mod hazard;
pub mod history;
pub mod ingest;
pub mod kinematics;
pub mod movement;
pub mod narrate;
pub mod scheduler;
pub mod speech;
mod worker;

pub use config::PathsenseConfig;
pub use detect::{
    resolve_object_id, BoundingBox, DetectionPoint, ObjectId, ObjectTracker, ScriptedPath,
    ScriptedTracker,
};
pub use engine::{DetectionSummary, Engine, EngineConfig, EngineStatus, FrameReport};
pub use frame::Frame;
pub use hazard::{Hazard, HazardClassifier, HazardConfig, HazardPriority};
pub use history::{HistoryStore, TrackedObject};
pub use ingest::{
    open_source, DirectorySource, FrameSource, LoopingSource, SyntheticConfig, SyntheticSource,
};
pub use movement::{Direction, MovementClassifier, MovementConfig, MovementKind};
pub use narrate::{FallbackNarrator, Narrator, SceneCaptioner, StaticCaptioner};
pub use scheduler::{
    AlertConfig, NarrationReport, Scheduler, SchedulerConfig, SchedulerState, SchedulerStats,
};
pub use speech::{AudioOutput, LogAudio, SpeechConfig, SpeechDispatcher, SpeechPriority};
