//! 2D pixel-space kinematics over a trajectory snapshot.
//!
//! Everything here is a stateless heuristic: velocity is pixels per frame,
//! growth is bounding-box area percentage. Nothing is a physical distance.

use crate::detect::{BoundingBox, DetectionPoint};

#[derive(Debug, Clone)]
pub struct KinematicsConfig {
    /// Fraction of each frame dimension covered by the centered zone.
    pub center_zone_fraction: f64,
    /// Minimum decrease (px) in distance to frame center that counts as approach.
    pub min_approach_px: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            center_zone_fraction: 0.4,
            min_approach_px: 15.0,
        }
    }
}

/// Average velocity `(dx, dy)` in px/frame between the first and last point.
pub fn velocity(points: &[DetectionPoint]) -> (f64, f64) {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return (0.0, 0.0);
    };
    if points.len() < 2 {
        return (0.0, 0.0);
    }
    let frames = (points.len() - 1) as f64;
    (
        (last.center().0 - first.center().0) / frames,
        (last.center().1 - first.center().1) / frames,
    )
}

pub fn speed(v: (f64, f64)) -> f64 {
    v.0.hypot(v.1)
}

/// Percentage area change across the points within `window_secs` of the
/// latest timestamp.
pub fn area_growth(points: &[DetectionPoint], window_secs: f64) -> f64 {
    let Some(latest) = points.last() else {
        return 0.0;
    };
    let window_start = latest.timestamp() - window_secs;
    let mut in_window = points.iter().filter(|p| p.timestamp() >= window_start);
    let Some(oldest) = in_window.next() else {
        return 0.0;
    };
    let Some(newest) = in_window.last() else {
        return 0.0;
    };
    if oldest.area() == 0.0 {
        return 0.0;
    }
    (newest.area() - oldest.area()) / oldest.area() * 100.0
}

/// True when the box center lies inside the centered zone (bounds inclusive).
pub fn is_in_center_zone(bbox: &BoundingBox, frame_w: u32, frame_h: u32, fraction: f64) -> bool {
    let (cx, cy) = bbox.center();
    let (fw, fh) = (frame_w as f64, frame_h as f64);
    let half_w = fw * fraction / 2.0;
    let half_h = fh * fraction / 2.0;
    let (mid_x, mid_y) = (fw / 2.0, fh / 2.0);
    (mid_x - half_w..=mid_x + half_w).contains(&cx)
        && (mid_y - half_h..=mid_y + half_h).contains(&cy)
}

/// True when the distance to the frame center shrank by more than
/// `min_approach_px` between the first and last point. Lateral drift and
/// shake keep the distance roughly constant and fail this test.
pub fn is_approaching_center(
    points: &[DetectionPoint],
    frame_w: u32,
    frame_h: u32,
    min_approach_px: f64,
) -> bool {
    if points.len() < 2 {
        return false;
    }
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return false;
    };
    let mid = (frame_w as f64 / 2.0, frame_h as f64 / 2.0);
    let dist = |p: &DetectionPoint| (p.center().0 - mid.0).hypot(p.center().1 - mid.1);
    dist(first) - dist(last) > min_approach_px
}

/// Fraction of the frame covered by the box.
pub fn area_ratio(bbox: &BoundingBox, frame_w: u32, frame_h: u32) -> f64 {
    let frame_area = frame_w as f64 * frame_h as f64;
    if frame_area == 0.0 {
        return 0.0;
    }
    bbox.area() / frame_area
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(frame: u64, t: f64, cx: f64, cy: f64, area: f64) -> DetectionPoint {
        DetectionPoint::new(frame, t, BoundingBox::centered(cx, cy, area).unwrap(), "car", 0.9, Some(1))
            .unwrap()
    }

    #[test]
    fn uniform_motion_velocity() {
        let points: Vec<_> = (0..5)
            .map(|i| pt(i, i as f64 / 30.0, 100.0 + 10.0 * i as f64, 200.0, 400.0))
            .collect();
        let (dx, dy) = velocity(&points);
        assert!((dx - 10.0).abs() < 1e-9);
        assert!(dy.abs() < 1e-9);
        assert!((speed((dx, dy)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_needs_two_points() {
        assert_eq!(velocity(&[]), (0.0, 0.0));
        assert_eq!(velocity(&[pt(0, 0.0, 5.0, 5.0, 100.0)]), (0.0, 0.0));
    }

    #[test]
    fn area_growth_respects_window() {
        let points = vec![
            pt(0, 0.0, 0.0, 0.0, 100.0),
            pt(1, 1.0, 0.0, 0.0, 1000.0),
            pt(2, 2.0, 0.0, 0.0, 2000.0),
        ];
        // Only the last two points fall within 1.5 s of t=2.0.
        assert!((area_growth(&points, 1.5) - 100.0).abs() < 1e-6);
        assert!((area_growth(&points, 5.0) - 1900.0).abs() < 1e-6);
        // A single point in the window yields no growth.
        assert_eq!(area_growth(&points, 0.5), 0.0);
    }

    #[test]
    fn area_growth_zero_area_is_zero() {
        let zero = DetectionPoint::new(0, 0.0, BoundingBox::new(5.0, 5.0, 5.0, 5.0).unwrap(), "car", 0.5, None)
            .unwrap();
        let points = vec![zero, pt(1, 0.1, 5.0, 5.0, 100.0)];
        assert_eq!(area_growth(&points, 1.0), 0.0);
    }

    #[test]
    fn center_zone_membership() {
        let inside = BoundingBox::centered(640.0, 360.0, 100.0).unwrap();
        let edge = BoundingBox::centered(640.0 + 256.0, 360.0, 100.0).unwrap();
        let outside = BoundingBox::centered(100.0, 100.0, 100.0).unwrap();
        assert!(is_in_center_zone(&inside, 1280, 720, 0.4));
        assert!(is_in_center_zone(&edge, 1280, 720, 0.4));
        assert!(!is_in_center_zone(&outside, 1280, 720, 0.4));
    }

    #[test]
    fn approach_requires_net_decrease_beyond_threshold() {
        let toward = vec![pt(0, 0.0, 700.0, 400.0, 100.0), pt(1, 0.1, 640.0, 360.0, 100.0)];
        assert!(is_approaching_center(&toward, 1280, 720, 15.0));

        // Lateral drift around the center keeps the distance constant.
        let lateral = vec![pt(0, 0.0, 600.0, 360.0, 100.0), pt(1, 0.1, 680.0, 360.0, 100.0)];
        assert!(!is_approaching_center(&lateral, 1280, 720, 15.0));

        let small = vec![pt(0, 0.0, 660.0, 360.0, 100.0), pt(1, 0.1, 650.0, 360.0, 100.0)];
        assert!(!is_approaching_center(&small, 1280, 720, 15.0));
    }

    #[test]
    fn area_ratio_of_frame() {
        let bbox = BoundingBox::new(0.0, 0.0, 640.0, 720.0).unwrap();
        assert!((area_ratio(&bbox, 1280, 720) - 0.5).abs() < 1e-9);
    }
}
