mod backend;
mod backends;
mod identity;
mod result;

pub use backend::ObjectTracker;
pub use backends::{ScriptedPath, ScriptedTracker};
pub use identity::{resolve_object_id, synthesize_object_id, SYNTHETIC_ID_FLAG};
pub use result::{BoundingBox, DetectionPoint, ObjectId};
