//! Alert rate limiting.
//!
//! A hazard turns into an alert only when both the global cooldown and the
//! cooldown for the hazard's identity have elapsed. The beep additionally has
//! its own cooldown and is suppressed for objects that already fill a large
//! part of the frame.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::detect::ObjectId;
use crate::hazard::{self, Hazard, HazardPriority};
use crate::history::HistoryStore;
use crate::kinematics;

#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Minimum time between any two alerts.
    pub global_cooldown: Duration,
    /// Minimum time before re-alerting about the same identity.
    pub hazard_cooldown: Duration,
    /// Frame fraction above which a high-priority object gets no beep.
    pub near_field_area_ratio: f64,
    pub beep_frequency_hz: u32,
    pub beep_duration: Duration,
    pub beep_cooldown: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            global_cooldown: Duration::from_secs(5),
            hazard_cooldown: Duration::from_secs(3),
            near_field_area_ratio: 0.4,
            beep_frequency_hz: 800,
            beep_duration: Duration::from_millis(200),
            beep_cooldown: Duration::from_secs(2),
        }
    }
}

/// An alert cleared for dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub message: String,
    pub object_id: ObjectId,
    pub priority: HazardPriority,
    /// Play the alert tone before speaking.
    pub beep: bool,
}

pub struct AlertGate {
    config: AlertConfig,
    last_alert: Option<Instant>,
    last_by_identity: HashMap<ObjectId, Instant>,
    last_beep: Option<Instant>,
}

fn elapsed_at_least(last: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
    last.map_or(true, |t| now.saturating_duration_since(t) >= cooldown)
}

impl AlertGate {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            last_alert: None,
            last_by_identity: HashMap::new(),
            last_beep: None,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Decide whether this frame's hazards produce an alert at `now`.
    ///
    /// Both cooldowns are recorded only when an alert is returned.
    pub fn evaluate(
        &mut self,
        hazards: &[Hazard],
        store: &HistoryStore,
        frame_width: u32,
        frame_height: u32,
        now: Instant,
    ) -> Option<Alert> {
        if !hazard::should_warn(hazards) {
            return None;
        }
        let primary = hazard::primary_hazard(hazards)?;
        let message = hazard::warning_message(hazards)?;

        if !elapsed_at_least(self.last_alert, now, self.config.global_cooldown) {
            log::debug!("alert suppressed by global cooldown: {}", message);
            return None;
        }
        let last_same = self.last_by_identity.get(&primary.object_id).copied();
        if !elapsed_at_least(last_same, now, self.config.hazard_cooldown) {
            log::debug!(
                "alert suppressed: object {} warned {:?} ago",
                primary.object_id,
                last_same.map(|t| now.saturating_duration_since(t))
            );
            return None;
        }

        self.last_alert = Some(now);
        self.last_by_identity.insert(primary.object_id, now);
        let hazard_cooldown = self.config.hazard_cooldown;
        self.last_by_identity
            .retain(|_, t| now.saturating_duration_since(*t) < hazard_cooldown || *t == now);

        let beep = primary.priority == HazardPriority::High
            && !self.near_field(hazards, store, frame_width, frame_height)
            && self.take_beep(now);

        Some(Alert {
            message,
            object_id: primary.object_id,
            priority: primary.priority,
            beep,
        })
    }

    fn near_field(&self, hazards: &[Hazard], store: &HistoryStore, frame_width: u32, frame_height: u32) -> bool {
        hazards
            .iter()
            .filter(|h| h.priority == HazardPriority::High)
            .filter_map(|h| store.get_object(h.object_id))
            .filter_map(|object| object.latest().map(|p| *p.bbox()))
            .any(|bbox| {
                let ratio = kinematics::area_ratio(&bbox, frame_width, frame_height);
                if ratio > self.config.near_field_area_ratio {
                    log::debug!("suppressing beep: object too close (area ratio {:.2})", ratio);
                    true
                } else {
                    false
                }
            })
    }

    fn take_beep(&mut self, now: Instant) -> bool {
        if !elapsed_at_least(self.last_beep, now, self.config.beep_cooldown) {
            log::debug!("beep on cooldown");
            return false;
        }
        self.last_beep = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, DetectionPoint};

    fn hazard(id: ObjectId, class_name: &str, priority: HazardPriority) -> Hazard {
        Hazard {
            object_id: id,
            class_name: class_name.to_string(),
            priority,
            reason: "approaching".to_string(),
        }
    }

    fn store_with(id: ObjectId, area: f64) -> HistoryStore {
        let store = HistoryStore::default();
        let bbox = BoundingBox::centered(640.0, 360.0, area).unwrap();
        store.add_detection(
            id,
            DetectionPoint::new(1, 0.0, bbox, "car", 0.9, Some(id)).unwrap(),
        );
        store
    }

    fn gate(global_secs: u64) -> AlertGate {
        AlertGate::new(AlertConfig {
            global_cooldown: Duration::from_secs(global_secs),
            ..AlertConfig::default()
        })
    }

    #[test]
    fn same_identity_respects_hazard_cooldown() {
        let store = store_with(1, 5000.0);
        let mut gate = gate(0);
        let t0 = Instant::now();
        let hazards = vec![hazard(1, "car", HazardPriority::High)];

        let first = gate.evaluate(&hazards, &store, 1280, 720, t0).unwrap();
        assert_eq!(first.message, "STOP! Car in front of you");
        assert!(first.beep);

        assert!(gate
            .evaluate(&hazards, &store, 1280, 720, t0 + Duration::from_secs(1))
            .is_none());
        assert!(gate
            .evaluate(&hazards, &store, 1280, 720, t0 + Duration::from_secs(3))
            .is_some());
    }

    #[test]
    fn global_cooldown_covers_other_identities() {
        let store = HistoryStore::default();
        let mut gate = gate(5);
        let t0 = Instant::now();

        assert!(gate
            .evaluate(&[hazard(1, "car", HazardPriority::Medium)], &store, 1280, 720, t0)
            .is_some());
        assert!(gate
            .evaluate(
                &[hazard(2, "bus", HazardPriority::Medium)],
                &store,
                1280,
                720,
                t0 + Duration::from_secs(4)
            )
            .is_none());
        let later = gate
            .evaluate(
                &[hazard(2, "bus", HazardPriority::Medium)],
                &store,
                1280,
                720,
                t0 + Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(later.message, "Warning: Bus detected");
        assert!(!later.beep);
    }

    #[test]
    fn near_field_silences_beep_but_not_speech() {
        // 50% of a 1280x720 frame.
        let store = store_with(7, 460_800.0);
        let mut gate = gate(0);
        let alert = gate
            .evaluate(
                &[hazard(7, "truck", HazardPriority::High)],
                &store,
                1280,
                720,
                Instant::now(),
            )
            .unwrap();
        assert!(!alert.beep);
        assert_eq!(alert.message, "STOP! Truck in front of you");
    }

    #[test]
    fn beep_has_its_own_cooldown() {
        let store = HistoryStore::default();
        let mut gate = AlertGate::new(AlertConfig {
            global_cooldown: Duration::ZERO,
            hazard_cooldown: Duration::ZERO,
            ..AlertConfig::default()
        });
        let t0 = Instant::now();
        let hazards = [hazard(1, "car", HazardPriority::High)];
        assert!(gate.evaluate(&hazards, &store, 1280, 720, t0).unwrap().beep);
        assert!(!gate
            .evaluate(&hazards, &store, 1280, 720, t0 + Duration::from_secs(1))
            .unwrap()
            .beep);
        assert!(gate
            .evaluate(&hazards, &store, 1280, 720, t0 + Duration::from_secs(2))
            .unwrap()
            .beep);
    }

    #[test]
    fn no_hazards_no_alert() {
        let mut gate = gate(0);
        assert!(gate
            .evaluate(&[], &HistoryStore::default(), 1280, 720, Instant::now())
            .is_none());
    }
}
