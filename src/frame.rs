//! Video frames handed between the capture thread and the two loops.
//!
//! - `Frame`: RGB8 pixels plus dimensions and an optional source label.
//! - Frames are validated on construction; a frame that fails validation never
//!   reaches a tracker or the history store.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;

/// Upper bound on accepted encoded image size.
pub const MAX_ENCODED_BYTES: usize = 16 * 1024 * 1024;

/// Decoded RGB8 frame.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Source label (image file name, stream name). Used in logs only.
    pub label: Option<String>,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame pixel buffer is {} bytes, expected {} for {}x{} RGB",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            label: None,
        })
    }

    /// Solid black frame.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        Self::new(vec![0u8; width as usize * height as usize * 3], width, height)
    }

    /// Decode an encoded image (JPEG or PNG).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("empty image payload"));
        }
        if bytes.len() > MAX_ENCODED_BYTES {
            return Err(anyhow!(
                "image payload of {} bytes exceeds {} byte limit",
                bytes.len(),
                MAX_ENCODED_BYTES
            ));
        }
        let image = image::load_from_memory(bytes).context("decode image")?;
        let (width, height) = image.dimensions();
        let rgb = image.into_rgb8();
        Self::new(rgb.into_raw(), width, height)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
