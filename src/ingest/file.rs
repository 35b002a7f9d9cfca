//! Local file frame source.
//!
//! This module provides `FileSource` for ingesting frames from one uploaded video.
//! The file source is responsible for:
//! - Refusing remote URLs and unsupported container extensions
//! - Decoding video frames in-memory, in order
//! - Deriving the per-frame time step from the stream frame rate
//!
//! `stub://` paths select a synthetic clip. Query parameters tune it, e.g.
//! `stub://cabin?frames=90&fps=30&width=320&height=240`.

use std::path::Path;

use anyhow::{anyhow, Result};

use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::{frame_delta_secs, Frame, DEFAULT_FALLBACK_FPS};

const DEFAULT_SYNTHETIC_FRAMES: u64 = 300;
const DEFAULT_SYNTHETIC_WIDTH: u32 = 320;
const DEFAULT_SYNTHETIC_HEIGHT: u32 = 240;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "/tmp/upload/driver.mp4") or `stub://...`.
    pub path: String,
    /// Frame rate assumed when the container does not report one.
    pub fallback_fps: f64,
    /// Accepted container extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            fallback_fps: DEFAULT_FALLBACK_FPS,
            allowed_extensions: vec!["mp4".into(), "avi".into(), "mov".into()],
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    /// Open the source. Fails when the path is remote, has an unsupported
    /// extension, does not exist, or cannot be decoded.
    pub fn open(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            let source = SyntheticFileSource::new(config)?;
            log::info!(
                "FileSource: opened {} (synthetic, {} frames)",
                source.config.path,
                source.total_frames
            );
            return Ok(Self {
                backend: FileBackend::Synthetic(source),
            });
        }

        check_extension(&config)?;
        if !Path::new(&config.path).is_file() {
            return Err(anyhow!("video file {} does not exist", config.path));
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding {} requires the ingest-file-ffmpeg feature",
                config.path
            ))
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameSource for FileSource {
    fn frame_delta_secs(&self) -> f64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.frame_delta_secs(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frame_delta_secs(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_decoded: u64,
    pub path: String,
    /// Frame rate reported by the container, if any.
    pub stream_fps: Option<f64>,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    fps: Option<f64>,
    total_frames: u64,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        let mut source = Self {
            fps: None,
            total_frames: DEFAULT_SYNTHETIC_FRAMES,
            width: DEFAULT_SYNTHETIC_WIDTH,
            height: DEFAULT_SYNTHETIC_HEIGHT,
            frame_count: 0,
            config,
        };
        let query = source
            .config
            .path
            .split_once('?')
            .map(|(_, q)| q.to_string())
            .unwrap_or_default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid stub parameter '{}'", pair))?;
            match key {
                "frames" => source.total_frames = parse_param(key, value)?,
                "fps" => source.fps = Some(parse_param(key, value)?),
                "width" => source.width = parse_param(key, value)?,
                "height" => source.height = parse_param(key, value)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        Ok(source)
    }

    fn frame_delta_secs(&self) -> f64 {
        frame_delta_secs(self.fps, self.config.fallback_fps)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.frame_count >= self.total_frames {
            return Ok(None);
        }
        self.frame_count += 1;
        let shade = (self.frame_count % 64) as u8;
        let frame = Frame::filled(
            self.width,
            self.height,
            self.frame_count,
            [32 + shade, 32 + shade, 48 + shade],
        )?;
        Ok(Some(frame))
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.frame_count,
            path: self.config.path.clone(),
            stream_fps: self.fps,
        }
    }
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("invalid value for stub parameter '{}': {}", key, value))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

fn check_extension(config: &FileConfig) -> Result<()> {
    let ext = Path::new(&config.path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if config.allowed_extensions.iter().any(|allowed| *allowed == ext) {
        Ok(())
    } else {
        Err(anyhow!(
            "unsupported video container '{}' (accepted: {})",
            config.path,
            config.allowed_extensions.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: &str) -> FileConfig {
        FileConfig {
            path: path.to_string(),
            ..FileConfig::default()
        }
    }

    #[test]
    fn synthetic_clip_honours_query_parameters() -> Result<()> {
        let mut source = FileSource::open(config("stub://cabin?frames=3&fps=10&width=8&height=6"))?;
        assert_eq!(source.frame_delta_secs(), 0.1);

        let mut numbers = Vec::new();
        while let Some(frame) = source.next_frame()? {
            assert_eq!((frame.width, frame.height), (8, 6));
            numbers.push(frame.number);
        }
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_decoded, 3);
        Ok(())
    }

    #[test]
    fn synthetic_clip_without_rate_uses_fallback() -> Result<()> {
        let source = FileSource::open(config("stub://cabin"))?;
        assert_eq!(source.frame_delta_secs(), 1.0 / 30.0);
        Ok(())
    }

    #[test]
    fn rejects_remote_and_unsupported_inputs() {
        assert!(FileSource::open(config("https://example.com/v.mp4")).is_err());
        assert!(FileSource::open(config("")).is_err());
        let err = FileSource::open(config("/tmp/driver.mkv")).err().unwrap();
        assert!(err.to_string().contains("unsupported video container"));
        assert!(FileSource::open(config("stub://x?speed=2")).is_err());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(check_extension(&config("/videos/Drive.MP4")).is_ok());
        assert!(check_extension(&config("/videos/drive")).is_err());
    }

    #[test]
    fn missing_file_is_reported() {
        let err = FileSource::open(config("/definitely/not/here.mov"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("does not exist"));
    }
}
