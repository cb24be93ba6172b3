//! Local frame sources.
//!
//! - `SyntheticSource` (`stub://`): generated frames, no I/O.
//! - `DirectorySource`: decodes the image files of one directory in name order.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Source name (e.g., "stub://front_camera").
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Frames before end-of-stream; `None` never ends.
    pub frames: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://front_camera".to_string(),
            width: 1280,
            height: 720,
            frames: None,
        }
    }
}

/// Generated frames with a slowly shifting gradient.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    position: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if !config.url.starts_with("stub://") {
            return Err(anyhow!("synthetic source url must start with stub://"));
        }
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic source dimensions must be non-zero"));
        }
        Ok(Self {
            config,
            frame_count: 0,
            position: 0,
            connected: false,
        })
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * 3;
        (0..pixel_count)
            .map(|i| ((i as u64 + self.position) % 256) as u8)
            .collect()
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!("frame source: connected to {} (synthetic)", self.config.url);
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source not connected; call connect() first"));
        }
        if self.config.frames.is_some_and(|limit| self.position >= limit) {
            return Ok(None);
        }
        let frame = Frame::new(self.generate_pixels(), self.config.width, self.config.height)?
            .with_label(self.config.url.clone());
        self.position += 1;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            rewinds: 0,
            source: self.config.url.clone(),
        }
    }

    fn release(&mut self) {
        self.connected = false;
    }
}

/// Image files in a directory, replayed in file-name order.
pub struct DirectorySource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl DirectorySource {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            position: 0,
            frame_count: 0,
            last_error: None,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for DirectorySource {
    fn connect(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("read image directory {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
            if path.is_file() && is_image {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", self.dir.display()));
        }
        files.sort();
        log::info!(
            "frame source: {} images from {}",
            files.len(),
            self.dir.display()
        );
        self.files = files;
        self.position = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.position).cloned() else {
            return Ok(None);
        };
        self.position += 1;
        let decoded = std::fs::read(&path)
            .with_context(|| format!("read {}", path.display()))
            .and_then(|bytes| Frame::decode(&bytes).with_context(|| format!("decode {}", path.display())));
        match decoded {
            Ok(frame) => {
                self.frame_count += 1;
                self.last_error = None;
                let label = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(Some(frame.with_label(label)))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.files.is_empty() && self.last_error.is_none()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            rewinds: 0,
            source: self.dir.display().to_string(),
        }
    }
}
