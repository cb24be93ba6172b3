//! Scene captioning and narration interfaces.
//!
//! The captioning model and the language-model narrator are external
//! collaborators. The cognitive loop owns one of each and only talks to them
//! through these traits.

mod caption;
#[cfg(feature = "narrator-ollama")]
mod ollama;
mod prompt;

pub use caption::{sanitize_caption, DEFAULT_CAPTION};
#[cfg(feature = "narrator-ollama")]
pub use ollama::{OllamaConfig, OllamaNarrator};
pub use prompt::{clean_narration, compose_prompt};

use anyhow::Result;

use crate::frame::Frame;

/// Produces a one-sentence description of a frame.
pub trait SceneCaptioner: Send {
    fn name(&self) -> &'static str;

    fn caption(&mut self, frame: &Frame) -> Result<String>;
}

impl<T: SceneCaptioner + ?Sized> SceneCaptioner for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn caption(&mut self, frame: &Frame) -> Result<String> {
        (**self).caption(frame)
    }
}

/// Turns a caption plus movement descriptions into one spoken sentence.
///
/// `None` means narration is unavailable for this request; callers fall back
/// to speaking the caption.
pub trait Narrator: Send {
    fn name(&self) -> &'static str;

    fn narrate(&mut self, caption: &str, movements: &[String]) -> Option<String>;

    /// Cheap reachability probe used at startup. Unreachable narrators are
    /// still used; the probe only decides whether to warn.
    fn check_connection(&self) -> bool {
        true
    }
}

impl<T: Narrator + ?Sized> Narrator for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn narrate(&mut self, caption: &str, movements: &[String]) -> Option<String> {
        (**self).narrate(caption, movements)
    }

    fn check_connection(&self) -> bool {
        (**self).check_connection()
    }
}

/// Returns the same caption for every frame.
#[derive(Clone, Debug)]
pub struct StaticCaptioner {
    caption: String,
}

impl StaticCaptioner {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }
}

impl Default for StaticCaptioner {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTION)
    }
}

impl SceneCaptioner for StaticCaptioner {
    fn name(&self) -> &'static str {
        "static"
    }

    fn caption(&mut self, _frame: &Frame) -> Result<String> {
        Ok(sanitize_caption(&self.caption))
    }
}

/// Narrator with no backing service. Every request falls back to the caption.
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackNarrator;

impl Narrator for FallbackNarrator {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn narrate(&mut self, _caption: &str, _movements: &[String]) -> Option<String> {
        None
    }

    fn check_connection(&self) -> bool {
        false
    }
}

/// Text spoken when narration is unavailable.
pub fn caption_fallback(caption: &str) -> String {
    format!("Scene: {}", caption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_captioner_sanitizes_its_caption() -> Result<()> {
        let frame = Frame::blank(2, 2)?;
        let mut captioner = StaticCaptioner::new("a man standing in front of a mirror");
        assert_eq!(captioner.caption(&frame)?, "a man standing facing the camera");
        Ok(())
    }

    #[test]
    fn fallback_narrator_defers_to_caption() {
        let mut narrator: Box<dyn Narrator> = Box::new(FallbackNarrator);
        assert!(narrator.narrate("a street", &[]).is_none());
        assert!(!narrator.check_connection());
        assert_eq!(caption_fallback("a street"), "Scene: a street");
    }
}
