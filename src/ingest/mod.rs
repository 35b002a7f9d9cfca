//! Frame ingestion sources.
//!
//! This module provides sources of decoded frames for one uploaded video:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` clips (testing and demos)
//!
//! Every source yields frames strictly in order and reports the per-frame time
//! step the behavior tracker accumulates. A source that cannot be opened or
//! decoded is a fatal error for that video.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use anyhow::Result;

use crate::frame::Frame;

pub use file::{FileConfig, FileSource, FileStats};

/// A sequential, finite stream of decoded frames.
pub trait FrameSource {
    /// Seconds each frame represents (1 / frame rate, with fallback).
    fn frame_delta_secs(&self) -> f64;

    /// Decode the next frame. `Ok(None)` means the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
