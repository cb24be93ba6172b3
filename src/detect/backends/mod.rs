pub mod scripted;

pub use scripted::{ScriptedPath, ScriptedTracker};
