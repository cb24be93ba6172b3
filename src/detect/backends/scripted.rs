use anyhow::Result;

use crate::detect::backend::ObjectTracker;
use crate::detect::result::{BoundingBox, DetectionPoint, ObjectId};
use crate::frame::Frame;

/// Linear path of one synthetic object across a range of script steps.
#[derive(Clone, Debug)]
pub struct ScriptedPath {
    pub class_name: String,
    pub track_id: Option<ObjectId>,
    /// First and last step (inclusive) at which the object is visible.
    pub steps: (u64, u64),
    pub from_center: (f64, f64),
    pub to_center: (f64, f64),
    pub from_area: f64,
    pub to_area: f64,
}

impl ScriptedPath {
    fn sample(&self, step: u64) -> Option<(BoundingBox, f64)> {
        let (start, end) = self.steps;
        if step < start || step > end {
            return None;
        }
        let f = if end == start {
            1.0
        } else {
            (step - start) as f64 / (end - start) as f64
        };
        let lerp = |a: f64, b: f64| a + (b - a) * f;
        let cx = lerp(self.from_center.0, self.to_center.0);
        let cy = lerp(self.from_center.1, self.to_center.1);
        let area = lerp(self.from_area, self.to_area);
        BoundingBox::centered(cx, cy, area).ok().map(|b| (b, f))
    }
}

/// Tracker that replays scripted object paths instead of running a model.
///
/// Steps are derived from the frame id (`(frame_id - 1) % period`), so a looping
/// frame source replays the script indefinitely. Used for tests, the demo
/// and headless daemon runs without a model backend.
pub struct ScriptedTracker {
    paths: Vec<ScriptedPath>,
    period: u64,
}

impl ScriptedTracker {
    pub fn new(paths: Vec<ScriptedPath>, period: u64) -> Self {
        Self {
            paths,
            period: period.max(1),
        }
    }

    /// A car holding still for the first half of `frames`, then growing from
    /// 1000 to 3000 px² while drifting from (700, 400) to the center of a
    /// 1280x720 frame.
    pub fn approaching_car(frames: u64) -> Self {
        let frames = frames.max(2);
        let hold = frames / 2;
        let paths = vec![
            ScriptedPath {
                class_name: "car".to_string(),
                track_id: Some(1),
                steps: (0, hold),
                from_center: (700.0, 400.0),
                to_center: (700.0, 400.0),
                from_area: 1000.0,
                to_area: 1000.0,
            },
            ScriptedPath {
                class_name: "car".to_string(),
                track_id: Some(1),
                steps: (hold + 1, frames - 1),
                from_center: (700.0, 400.0),
                to_center: (640.0, 360.0),
                from_area: 1000.0,
                to_area: 3000.0,
            },
        ];
        Self::new(paths, frames)
    }

    /// A car crossing the frame left to right at constant size.
    pub fn passing_car(frames: u64) -> Self {
        let frames = frames.max(2);
        Self::new(
            vec![ScriptedPath {
                class_name: "car".to_string(),
                track_id: Some(2),
                steps: (0, frames - 1),
                from_center: (100.0, 500.0),
                to_center: (100.0 + 10.0 * (frames - 1) as f64, 500.0),
                from_area: 4000.0,
                to_area: 4000.0,
            }],
            frames,
        )
    }

    pub fn period(&self) -> u64 {
        self.period
    }
}

impl ObjectTracker for ScriptedTracker {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn track(
        &mut self,
        _frame: &Frame,
        frame_id: u64,
        timestamp: f64,
    ) -> Result<Vec<DetectionPoint>> {
        let step = frame_id.saturating_sub(1) % self.period;
        let mut detections = Vec::new();
        for path in &self.paths {
            if let Some((bbox, _)) = path.sample(step) {
                detections.push(DetectionPoint::new(
                    frame_id,
                    timestamp,
                    bbox,
                    path.class_name.clone(),
                    0.9,
                    path.track_id,
                )?);
            }
        }
        Ok(detections)
    }
}
