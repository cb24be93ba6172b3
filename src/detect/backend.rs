use anyhow::Result;

use crate::detect::result::DetectionPoint;
use crate::frame::Frame;

/// Object detector + tracker.
///
/// Implementations turn a frame into detections carrying box, class label,
/// confidence and, ideally, a stable per-object track identity. Detections
/// without an identity get one synthesized by `detect::resolve_object_id`.
///
/// A tracker handle is owned by exactly one loop and is never shared.
pub trait ObjectTracker: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection and tracking on one frame.
    fn track(&mut self, frame: &Frame, frame_id: u64, timestamp: f64)
        -> Result<Vec<DetectionPoint>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: ObjectTracker + ?Sized> ObjectTracker for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn track(
        &mut self,
        frame: &Frame,
        frame_id: u64,
        timestamp: f64,
    ) -> Result<Vec<DetectionPoint>> {
        (**self).track(frame, frame_id, timestamp)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
