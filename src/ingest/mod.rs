//! Frame sources.
//!
//! This module provides sources of decoded frames:
//! - Synthetic frames (`stub://name`) for tests and headless runs
//! - Image directories (sorted JPEG/PNG files), the replay path for recorded walks
//! - `LoopingSource`, which rewinds any source at end-of-stream
//!
//! Sources are owned by the capture thread. Read failures on a single frame are
//! reported as errors and the caller skips that frame; only `connect` failures
//! are fatal.

pub mod file;

pub use file::{DirectorySource, SyntheticConfig, SyntheticSource};

use anyhow::{anyhow, Result};

use crate::frame::Frame;

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub rewinds: u64,
    pub source: String,
}

pub trait FrameSource: Send {
    /// Acquire the underlying device or files.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` at end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Restart from the first frame.
    fn rewind(&mut self) -> Result<()>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;

    /// Release the device. Called once on shutdown.
    fn release(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Wraps a source so end-of-stream restarts from the beginning.
pub struct LoopingSource<S> {
    inner: S,
    rewinds: u64,
}

impl<S: FrameSource> LoopingSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, rewinds: 0 }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: FrameSource> FrameSource for LoopingSource<S> {
    fn connect(&mut self) -> Result<()> {
        self.inner.connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.inner.next_frame()? {
            return Ok(Some(frame));
        }
        self.inner.rewind()?;
        self.rewinds += 1;
        log::debug!("source {} rewound (#{})", self.inner.stats().source, self.rewinds);
        // An empty source stays empty; report end-of-stream instead of spinning.
        self.inner.next_frame()
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            rewinds: self.rewinds,
            ..self.inner.stats()
        }
    }

    fn release(&mut self) {
        self.inner.release()
    }
}

/// Open a source from a spec string: `stub://name` or a local directory path.
///
/// Network URLs are rejected; camera and stream acquisition live outside
/// this crate and feed frames through `Scheduler::submit_frame`.
pub fn open_source(spec: &str, width: u32, height: u32, looping: bool) -> Result<Box<dyn FrameSource>> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(anyhow!("frame source must not be empty"));
    }
    let source: Box<dyn FrameSource> = if spec.starts_with("stub://") {
        Box::new(SyntheticSource::new(SyntheticConfig {
            url: spec.to_string(),
            width,
            height,
            frames: None,
        })?)
    } else if spec.contains("://") {
        return Err(anyhow!(
            "unsupported frame source '{}'; expected stub:// or a local image directory",
            spec
        ));
    } else {
        Box::new(DirectorySource::new(spec)?)
    };
    if looping {
        Ok(Box::new(LoopingSource::new(source)))
    } else {
        Ok(source)
    }
}
