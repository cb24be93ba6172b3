use sha2::{Digest, Sha256};

use super::result::{DetectionPoint, ObjectId};

/// High bit marks identities synthesized from box + class.
pub const SYNTHETIC_ID_FLAG: ObjectId = 1 << 63;

/// Identity for a detection: the tracker's id, or a deterministic hash of
/// the box coordinates and class label when the tracker supplied none.
pub fn resolve_object_id(point: &DetectionPoint) -> ObjectId {
    match point.track_id() {
        Some(id) => id,
        None => synthesize_object_id(point),
    }
}

pub fn synthesize_object_id(point: &DetectionPoint) -> ObjectId {
    let bbox = point.bbox();
    let mut hasher = Sha256::new();
    for coord in [bbox.x1, bbox.y1, bbox.x2, bbox.y2] {
        hasher.update(coord.to_bits().to_le_bytes());
    }
    hasher.update(point.class_name().to_lowercase().as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head) | SYNTHETIC_ID_FLAG
}
