//! Bounded per-object detection history shared by both loops.
//!
//! The reflex loop is the only writer; the cognitive loop and the hazard
//! classifier read copies. Every operation takes the single store lock, and
//! every read returns owned data so callers never see a buffer mid-update.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::detect::{DetectionPoint, ObjectId};

/// 90 frames at 30 fps = 3 seconds of history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 90;

/// Objects unseen for this many frames are swept.
pub const DEFAULT_MAX_MISSING_FRAMES: u64 = 30;

/// Detection history of one tracked identity.
#[derive(Clone, Debug)]
pub struct TrackedObject {
    id: ObjectId,
    history: VecDeque<DetectionPoint>,
    capacity: usize,
    first_seen: Option<f64>,
    last_seen: Option<f64>,
    class_name: Option<String>,
}

impl TrackedObject {
    pub fn new(id: ObjectId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id,
            history: VecDeque::with_capacity(capacity),
            capacity,
            first_seen: None,
            last_seen: None,
            class_name: None,
        }
    }

    /// Append a point, evicting the oldest one at capacity.
    pub fn add_detection(&mut self, point: DetectionPoint) {
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        if self.first_seen.is_none() {
            self.first_seen = Some(point.timestamp());
        }
        self.last_seen = Some(point.timestamp());
        // Sticky: the first label wins so narration does not flicker.
        if self.class_name.is_none() {
            self.class_name = Some(point.class_name().to_string());
        }
        self.history.push_back(point);
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn first_seen(&self) -> Option<f64> {
        self.first_seen
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.last_seen
    }

    /// Most recent `frames_back` points (or all of them), oldest first.
    pub fn trajectory(&self, frames_back: Option<usize>) -> Vec<DetectionPoint> {
        let skip = match frames_back {
            Some(n) => self.history.len().saturating_sub(n),
            None => 0,
        };
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Borrowed view of the buffer, oldest first.
    pub fn points(&self) -> impl ExactSizeIterator<Item = &DetectionPoint> + '_ {
        self.history.iter()
    }

    pub fn latest(&self) -> Option<&DetectionPoint> {
        self.history.back()
    }

    pub fn oldest(&self) -> Option<&DetectionPoint> {
        self.history.front()
    }
}

struct StoreInner {
    objects: HashMap<ObjectId, TrackedObject>,
    latest_frame: u64,
}

/// Thread-safe map of identity to bounded history.
pub struct HistoryStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(StoreInner {
                objects: HashMap::new(),
                latest_frame: 0,
            }),
        }
    }

    // Each operation leaves the map consistent before releasing the guard, so
    // a panic elsewhere while holding it does not corrupt the store.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("history store lock poisoned; recovering");
            poisoned.into_inner()
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Create-or-update the object and append `point`.
    pub fn add_detection(&self, id: ObjectId, point: DetectionPoint) {
        let capacity = self.capacity;
        let mut inner = self.lock();
        inner.latest_frame = inner.latest_frame.max(point.frame_id());
        inner
            .objects
            .entry(id)
            .or_insert_with(|| TrackedObject::new(id, capacity))
            .add_detection(point);
    }

    /// Copy of the last `frames_back` points (or the whole buffer). Empty for
    /// unknown identities.
    pub fn get_trajectory(&self, id: ObjectId, frames_back: Option<usize>) -> Vec<DetectionPoint> {
        self.lock()
            .objects
            .get(&id)
            .map(|obj| obj.trajectory(frames_back))
            .unwrap_or_default()
    }

    pub fn get_object(&self, id: ObjectId) -> Option<TrackedObject> {
        self.lock().objects.get(&id).cloned()
    }

    /// Point-in-time copy of every tracked object.
    pub fn get_all(&self) -> HashMap<ObjectId, TrackedObject> {
        self.lock().objects.clone()
    }

    pub fn remove(&self, id: ObjectId) -> Option<TrackedObject> {
        self.lock().objects.remove(&id)
    }

    /// Drop objects whose latest point is more than `max_missing` frames
    /// behind `current_frame`, or that hold no points. Returns the count removed.
    pub fn cleanup_stale(&self, current_frame: u64, max_missing: u64) -> usize {
        let mut inner = self.lock();
        let before = inner.objects.len();
        inner.objects.retain(|_, obj| match obj.latest() {
            Some(latest) => current_frame.saturating_sub(latest.frame_id()) <= max_missing,
            None => false,
        });
        let removed = before - inner.objects.len();
        if removed > 0 {
            log::debug!("cleaned up {} stale objects at frame {}", removed, current_frame);
        }
        removed
    }

    /// Highest frame number written so far.
    pub fn latest_frame(&self) -> u64 {
        self.lock().latest_frame
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().objects.is_empty()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use std::sync::Arc;

    fn point(frame_id: u64, class: &str) -> DetectionPoint {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        DetectionPoint::new(frame_id, frame_id as f64 / 30.0, bbox, class, 0.9, None).unwrap()
    }

    #[test]
    fn buffer_never_exceeds_capacity() {
        let store = HistoryStore::new(8);
        for frame in 0..100 {
            store.add_detection(1, point(frame, "car"));
            let obj = store.get_object(1).unwrap();
            assert!(obj.len() <= 8);
        }
        let trajectory = store.get_trajectory(1, None);
        assert_eq!(trajectory.len(), 8);
        // Oldest evicted first.
        assert_eq!(trajectory[0].frame_id(), 92);
        assert_eq!(trajectory[7].frame_id(), 99);
    }

    #[test]
    fn trajectory_frames_back_returns_most_recent() {
        let store = HistoryStore::default();
        for frame in 1..=5 {
            store.add_detection(3, point(frame, "person"));
        }
        let last_two: Vec<u64> = store
            .get_trajectory(3, Some(2))
            .iter()
            .map(|p| p.frame_id())
            .collect();
        assert_eq!(last_two, vec![4, 5]);
        assert_eq!(store.get_trajectory(3, Some(50)).len(), 5);
        assert!(store.get_trajectory(99, None).is_empty());
    }

    #[test]
    fn class_label_is_sticky() {
        let store = HistoryStore::default();
        store.add_detection(1, point(1, "car"));
        store.add_detection(1, point(2, "truck"));
        let obj = store.get_object(1).unwrap();
        assert_eq!(obj.class_name(), Some("car"));
        assert_eq!(obj.first_seen(), Some(1.0 / 30.0));
        assert_eq!(obj.last_seen(), Some(2.0 / 30.0));
    }

    #[test]
    fn cleanup_removes_exactly_the_stale_objects() {
        let store = HistoryStore::default();
        store.add_detection(1, point(10, "car")); // 100 - 10 = 90 behind
        store.add_detection(2, point(69, "car")); // 31 behind
        store.add_detection(3, point(70, "car")); // exactly 30 behind
        store.add_detection(4, point(100, "car"));

        let removed = store.cleanup_stale(100, 30);
        assert_eq!(removed, 2);
        let mut remaining: Vec<ObjectId> = store.get_all().keys().copied().collect();
        remaining.sort_unstable();
        assert_eq!(remaining, vec![3, 4]);
    }

    #[test]
    fn reads_are_snapshots() {
        let store = HistoryStore::default();
        store.add_detection(1, point(1, "car"));
        let snapshot = store.get_all();
        store.add_detection(1, point(2, "car"));
        assert_eq!(snapshot[&1].len(), 1);
        assert_eq!(store.get_object(1).unwrap().len(), 2);
        assert!(store.remove(1).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let store = Arc::new(HistoryStore::new(16));
        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for frame in 0..500 {
                    store.add_detection(frame % 4, point(frame, "car"));
                }
            })
        };
        for _ in 0..100 {
            for obj in store.get_all().values() {
                assert!(obj.len() <= 16);
            }
        }
        writer.join().unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.latest_frame(), 499);
    }
}
