use anyhow::{anyhow, Result};

/// Identity of a tracked object.
///
/// Tracker-assigned identities are small integers. Synthesized identities
/// carry the high bit (see `detect::identity`) so the two never collide.
pub type ObjectId = u64;

/// Axis-aligned bounding box in frame pixels, `(x1, y1)` top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(anyhow!("bounding box coordinates must be finite"));
        }
        if x2 < x1 || y2 < y1 {
            return Err(anyhow!(
                "bounding box is inverted: ({}, {}) -> ({}, {})",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Box centred on `(cx, cy)` covering `area` pixels with a square aspect.
    pub fn centered(cx: f64, cy: f64, area: f64) -> Result<Self> {
        let half = area.max(0.0).sqrt() / 2.0;
        Self::new(cx - half, cy - half, cx + half, cy + half)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn contains(&self, point: (f64, f64)) -> bool {
        let (x, y) = point;
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }

    /// Intersection area divided by the area of the smaller box.
    ///
    /// Degenerate boxes count as one square pixel.
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }
        let intersection = (ix2 - ix1) * (iy2 - iy1);
        let smaller = self.area().max(1.0).min(other.area().max(1.0));
        intersection / smaller
    }
}

/// One observation of one object in one frame. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionPoint {
    frame_id: u64,
    timestamp: f64,
    bbox: BoundingBox,
    area: f64,
    center: (f64, f64),
    class_name: String,
    confidence: f32,
    track_id: Option<ObjectId>,
}

impl DetectionPoint {
    /// Build a detection, rejecting malformed fields at the boundary.
    pub fn new(
        frame_id: u64,
        timestamp: f64,
        bbox: BoundingBox,
        class_name: impl Into<String>,
        confidence: f32,
        track_id: Option<ObjectId>,
    ) -> Result<Self> {
        let class_name = class_name.into();
        if class_name.trim().is_empty() {
            return Err(anyhow!("detection class label must not be empty"));
        }
        if !timestamp.is_finite() {
            return Err(anyhow!("detection timestamp must be finite"));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!(
                "detection confidence {} outside [0, 1]",
                confidence
            ));
        }
        Ok(Self {
            frame_id,
            timestamp,
            area: bbox.area(),
            center: bbox.center(),
            bbox,
            class_name,
            confidence,
            track_id,
        })
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn track_id(&self) -> Option<ObjectId> {
        self.track_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_area_and_center() {
        let bbox = BoundingBox::new(10.0, 20.0, 50.0, 100.0).unwrap();
        let point = DetectionPoint::new(3, 0.1, bbox, "car", 0.9, Some(7)).unwrap();
        assert_eq!(point.area(), 40.0 * 80.0);
        assert_eq!(point.center(), (30.0, 60.0));
        assert_eq!(point.track_id(), Some(7));
    }

    #[test]
    fn rejects_malformed_detections() {
        assert!(BoundingBox::new(10.0, 0.0, 5.0, 10.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.0, 5.0, 10.0).is_err());

        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        assert!(DetectionPoint::new(1, 0.0, bbox, "  ", 0.5, None).is_err());
        assert!(DetectionPoint::new(1, 0.0, bbox, "car", 1.5, None).is_err());
        assert!(DetectionPoint::new(1, f64::INFINITY, bbox, "car", 0.5, None).is_err());
    }

    #[test]
    fn overlap_ratio_uses_smaller_box() {
        let person = BoundingBox::new(0.0, 0.0, 100.0, 200.0).unwrap();
        let phone = BoundingBox::new(90.0, 50.0, 110.0, 70.0).unwrap();
        // Half of the phone lies inside the person box.
        assert!((phone.overlap_ratio(&person) - 0.5).abs() < 1e-9);
        let far = BoundingBox::new(300.0, 300.0, 310.0, 310.0).unwrap();
        assert_eq!(far.overlap_ratio(&person), 0.0);
    }
}
