//! Decoded video frames.
//!
//! - `Frame`: one RGB24 raster plus its 1-based position in the video.
//! - `frame_delta_secs`: per-frame time step derived from a stream frame rate.
//!
//! Frames are ephemeral: the pipeline owns each one for exactly one iteration
//! (detect, annotate, present) and then drops it.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// Frame rate assumed when the container does not report one.
pub const DEFAULT_FALLBACK_FPS: f64 = 30.0;

/// One decoded RGB24 frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// 1-based frame number within the video.
    pub number: u64,
}

impl Frame {
    /// Wrap a row-major RGB24 buffer. The buffer length must equal `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, number: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            number,
        })
    }

    /// Solid-colour frame, used by the synthetic source.
    pub fn filled(width: u32, height: u32, number: u64, rgb: [u8; 3]) -> Result<Self> {
        let pixel_count = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        let mut data = Vec::with_capacity(pixel_count * 3);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, number)
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGB value at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Copy into an `image` buffer for encoding.
    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("number", &self.number)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Seconds represented by one frame at `fps`, falling back when the rate is
/// missing, zero, or not finite.
pub fn frame_delta_secs(fps: Option<f64>, fallback_fps: f64) -> f64 {
    match fps {
        Some(fps) if fps.is_finite() && fps > 0.0 => 1.0 / fps,
        _ => 1.0 / fallback_fps,
    }
}
