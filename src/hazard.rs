//! Compound hazard classification for the reflex loop.
//!
//! Expansion alone never raises a hazard: the object must also be closing on
//! the frame center. A hand growing in place or a car drifting sideways fails
//! the approach test and stays silent.

use serde::Serialize;
use std::collections::HashSet;

use crate::detect::{resolve_object_id, DetectionPoint, ObjectId};
use crate::history::HistoryStore;
use crate::kinematics::{self, KinematicsConfig};

#[derive(Debug, Clone)]
pub struct HazardConfig {
    /// Class labels (COCO names) that can be hazards. Matched case-insensitively.
    pub classes: Vec<String>,
    /// Area growth (%) within the window that counts as expansion.
    pub expansion_threshold_pct: f64,
    /// Area shrink (%) within the window that marks an object as leaving.
    pub shrink_threshold_pct: f64,
    /// Area growth window in seconds.
    pub window_secs: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub kinematics: KinematicsConfig,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            classes: ["car", "truck", "bus", "bicycle", "motorcycle", "person"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            expansion_threshold_pct: 40.0,
            shrink_threshold_pct: 40.0,
            window_secs: 1.5,
            frame_width: 1280,
            frame_height: 720,
            kinematics: KinematicsConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardPriority {
    High,
    Medium,
}

impl HazardPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardPriority::High => "high",
            HazardPriority::Medium => "medium",
        }
    }
}

/// A prioritized safety concern about one object in one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hazard {
    pub object_id: ObjectId,
    pub class_name: String,
    pub priority: HazardPriority,
    pub reason: String,
}

pub struct HazardClassifier {
    config: HazardConfig,
    classes: HashSet<String>,
}

impl HazardClassifier {
    pub fn new(config: HazardConfig) -> Self {
        let classes = config.classes.iter().map(|c| c.to_lowercase()).collect();
        Self { config, classes }
    }

    pub fn config(&self) -> &HazardConfig {
        &self.config
    }

    pub fn is_hazard_class(&self, class_name: &str) -> bool {
        self.classes.contains(&class_name.to_lowercase())
    }

    /// Classify the current frame's detections against their history.
    ///
    /// Detections whose identity the store has not seen yet are judged on a
    /// single-point trajectory (which never qualifies as approaching).
    pub fn check_hazards(&self, detections: &[DetectionPoint], store: &HistoryStore) -> Vec<Hazard> {
        let cfg = &self.config;
        let mut hazards = Vec::new();

        for detection in detections {
            if !self.is_hazard_class(detection.class_name()) {
                continue;
            }
            let object_id = resolve_object_id(detection);
            let mut trajectory = store.get_trajectory(object_id, None);
            if trajectory.is_empty() {
                trajectory.push(detection.clone());
            }

            let growth = kinematics::area_growth(&trajectory, cfg.window_secs);
            if growth < -cfg.shrink_threshold_pct {
                continue;
            }
            let expanding = growth > cfg.expansion_threshold_pct;
            let approaching = kinematics::is_approaching_center(
                &trajectory,
                cfg.frame_width,
                cfg.frame_height,
                cfg.kinematics.min_approach_px,
            );
            if !(expanding && approaching) {
                continue;
            }

            let in_zone = kinematics::is_in_center_zone(
                detection.bbox(),
                cfg.frame_width,
                cfg.frame_height,
                cfg.kinematics.center_zone_fraction,
            );
            let mut reason = format!("approaching ({:.1}% growth, moving toward center)", growth);
            let priority = if in_zone {
                reason.push_str(", in center zone");
                HazardPriority::High
            } else {
                HazardPriority::Medium
            };

            hazards.push(Hazard {
                object_id,
                class_name: detection.class_name().to_string(),
                priority,
                reason,
            });
        }

        hazards
    }
}

pub fn should_warn(hazards: &[Hazard]) -> bool {
    hazards
        .iter()
        .any(|h| matches!(h.priority, HazardPriority::High | HazardPriority::Medium))
}

/// The hazard an alert is about: the first high-priority one, else the first
/// medium-priority one.
pub fn primary_hazard(hazards: &[Hazard]) -> Option<&Hazard> {
    hazards
        .iter()
        .find(|h| h.priority == HazardPriority::High)
        .or_else(|| hazards.iter().find(|h| h.priority == HazardPriority::Medium))
}

pub fn warning_message(hazards: &[Hazard]) -> Option<String> {
    let hazard = primary_hazard(hazards)?;
    let class_name = capitalize(&hazard.class_name);
    Some(match hazard.priority {
        HazardPriority::High => format!("STOP! {} in front of you", class_name),
        HazardPriority::Medium => format!("Warning: {} detected", class_name),
    })
}

/// Upper-case the first character and lower-case the rest.
pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}
