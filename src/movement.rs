//! Movement descriptions for narration.
//!
//! Two false-positive filters sit in front of the classifier:
//! - camera shake: most tracked objects moving the same way is read as the
//!   camera moving, and every motion claim for that pass is dropped;
//! - handheld suppression: small objects inside a tracked person's box move
//!   with the person and are not described at all.

use std::collections::{HashMap, HashSet};

use crate::detect::ObjectId;
use crate::hazard::capitalize;
use crate::history::TrackedObject;
use crate::kinematics;

#[derive(Debug, Clone, Copy)]
pub struct MotionThresholds {
    /// Speed (px/frame) below which an object may be stationary.
    pub velocity: f64,
    /// Absolute area growth (%) separating approach/leave from noise.
    pub area_pct: f64,
}

#[derive(Debug, Clone)]
pub struct MovementConfig {
    pub min_points: usize,
    pub normal: MotionThresholds,
    /// Stricter thresholds applied while the camera is judged to be shaking.
    pub shake: MotionThresholds,
    pub rapid_growth_pct: f64,
    pub window_secs: f64,
    /// Objects slower than this are ignored by shake detection.
    pub shake_min_speed: f64,
    /// Cosine similarity to the mean direction that counts as aligned.
    pub shake_alignment: f64,
    /// Fraction of aligned vectors above which shake is declared.
    pub shake_ratio: f64,
    /// Overlap (vs. the smaller box) above which a handheld object is held.
    pub handheld_overlap: f64,
    pub handheld_classes: Vec<String>,
    pub person_class: String,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            min_points: 5,
            normal: MotionThresholds {
                velocity: 5.0,
                area_pct: 25.0,
            },
            shake: MotionThresholds {
                velocity: 8.0,
                area_pct: 35.0,
            },
            rapid_growth_pct: 60.0,
            window_secs: 1.5,
            shake_min_speed: 1.0,
            shake_alignment: 0.7,
            shake_ratio: 0.7,
            handheld_overlap: 0.5,
            handheld_classes: [
                "cell phone",
                "mobile phone",
                "remote",
                "tv remote",
                "remote control",
                "keyboard",
                "mouse",
                "cup",
                "bottle",
                "glass",
                "wine glass",
                "book",
                "toothbrush",
                "scissors",
                "hair dryer",
                "hairbrush",
                "fork",
                "knife",
                "spoon",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            person_class: "person".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl Direction {
    fn from_velocity(dx: f64, dy: f64) -> Self {
        if dx.abs() > dy.abs() {
            if dx > 0.0 {
                Direction::LeftToRight
            } else {
                Direction::RightToLeft
            }
        } else if dy > 0.0 {
            Direction::TopToBottom
        } else {
            Direction::BottomToTop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::LeftToRight => "left to right",
            Direction::RightToLeft => "right to left",
            Direction::TopToBottom => "top to bottom",
            Direction::BottomToTop => "bottom to top",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementKind {
    Stationary,
    Approaching { rapid: bool },
    Leaving,
    PassingBy(Direction),
}

pub struct MovementClassifier {
    config: MovementConfig,
    handheld: HashSet<String>,
}

impl MovementClassifier {
    pub fn new(config: MovementConfig) -> Self {
        let handheld = config
            .handheld_classes
            .iter()
            .map(|c| c.to_lowercase())
            .collect();
        Self { config, handheld }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn classify(&self, object: &TrackedObject, shake_mode: bool) -> MovementKind {
        let cfg = &self.config;
        let points = object.trajectory(None);
        if points.len() < cfg.min_points {
            return MovementKind::Stationary;
        }
        let (dx, dy) = kinematics::velocity(&points);
        let growth = kinematics::area_growth(&points, cfg.window_secs);
        let thresholds = if shake_mode { cfg.shake } else { cfg.normal };

        if kinematics::speed((dx, dy)) < thresholds.velocity && growth.abs() < thresholds.area_pct {
            MovementKind::Stationary
        } else if growth > thresholds.area_pct {
            MovementKind::Approaching {
                rapid: growth > cfg.rapid_growth_pct,
            }
        } else if growth < -thresholds.area_pct {
            MovementKind::Leaving
        } else {
            MovementKind::PassingBy(Direction::from_velocity(dx, dy))
        }
    }

    /// Natural-language description without identities, e.g.
    /// `"Car: Moving left to right (passing by)"`.
    pub fn describe(&self, object: &TrackedObject, shake_mode: bool) -> String {
        let class_name = object
            .class_name()
            .map(capitalize)
            .unwrap_or_else(|| "Object".to_string());
        match self.classify(object, shake_mode) {
            MovementKind::Stationary => format!("{}: Stationary", class_name),
            MovementKind::Approaching { rapid: true } => {
                format!("{}: Approaching rapidly", class_name)
            }
            MovementKind::Approaching { rapid: false } => format!("{}: Approaching", class_name),
            MovementKind::Leaving => format!("{}: Leaving", class_name),
            MovementKind::PassingBy(direction) => {
                format!("{}: Moving {} (passing by)", class_name, direction.as_str())
            }
        }
    }

    /// True when most moving objects share one direction of motion.
    pub fn detect_camera_shake(&self, objects: &HashMap<ObjectId, TrackedObject>) -> bool {
        let cfg = &self.config;
        if objects.len() < 2 {
            return false;
        }
        let velocities: Vec<(f64, f64)> = objects
            .values()
            .filter(|obj| obj.len() >= 2)
            .map(|obj| kinematics::velocity(&obj.trajectory(None)))
            .filter(|v| kinematics::speed(*v) > cfg.shake_min_speed)
            .collect();
        if velocities.len() < 2 {
            return false;
        }

        let n = velocities.len() as f64;
        let mean = (
            velocities.iter().map(|v| v.0).sum::<f64>() / n,
            velocities.iter().map(|v| v.1).sum::<f64>() / n,
        );
        let mean_mag = kinematics::speed(mean);
        if mean_mag == 0.0 {
            return false;
        }
        let aligned = velocities
            .iter()
            .filter(|v| {
                let mag = kinematics::speed(**v);
                mag > 0.0 && (v.0 * mean.0 + v.1 * mean.1) / (mag * mean_mag) > cfg.shake_alignment
            })
            .count();
        aligned as f64 / n > cfg.shake_ratio
    }

    /// Describe every object worth narrating, ordered by identity.
    pub fn analyze_all(&self, objects: &HashMap<ObjectId, TrackedObject>) -> Vec<String> {
        let shaking = self.detect_camera_shake(objects);
        if shaking {
            log::debug!("camera shake detected; suppressing movement claims");
        }

        let persons: Vec<&TrackedObject> = objects
            .values()
            .filter(|obj| {
                obj.class_name()
                    .is_some_and(|c| c.eq_ignore_ascii_case(&self.config.person_class))
            })
            .collect();

        let mut ids: Vec<&ObjectId> = objects.keys().collect();
        ids.sort_unstable();

        let mut descriptions = Vec::new();
        for id in ids {
            let object = &objects[id];
            if self.is_held_by_person(object, &persons) {
                log::debug!(
                    "skipping handheld {} near person",
                    object.class_name().unwrap_or("object")
                );
                continue;
            }
            let kind = self.classify(object, shaking);
            if shaking && kind != MovementKind::Stationary {
                continue;
            }
            descriptions.push(self.describe(object, shaking));
        }
        descriptions
    }

    fn is_held_by_person(&self, object: &TrackedObject, persons: &[&TrackedObject]) -> bool {
        let class_name = object.class_name().unwrap_or_default().to_lowercase();
        if !self.handheld.contains(&class_name) || persons.is_empty() {
            return false;
        }
        let Some(latest) = object.latest() else {
            return true;
        };
        persons.iter().filter_map(|p| p.latest()).any(|person| {
            person.bbox().contains(latest.center())
                || latest.bbox().overlap_ratio(person.bbox()) > self.config.handheld_overlap
        })
    }
}

impl Default for MovementClassifier {
    fn default() -> Self {
        Self::new(MovementConfig::default())
    }
}
