//! Scripted detector backend.
//!
//! Replays a fixed list of detections per frame. A script is JSON lines: line
//! `n` holds the detections for frame `n` as an array of `{label, bbox}`
//! objects. Blank lines and frames past the end of the script yield nothing.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{clean_label, Detection};
use crate::frame::Frame;

/// Per-frame detections, indexed by 1-based frame number.
#[derive(Clone, Debug, Default)]
pub struct DetectionScript {
    frames: Vec<Vec<Detection>>,
}

impl DetectionScript {
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self { frames }
    }

    /// Append the detections for the next frame.
    pub fn push_frame(&mut self, detections: Vec<Detection>) {
        self.frames.push(detections);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                frames.push(Vec::new());
                continue;
            }
            let mut detections: Vec<Detection> = serde_json::from_str(line)
                .map_err(|e| anyhow!("invalid detection script line {}: {}", idx + 1, e))?;
            for det in &mut detections {
                det.label = clean_label(&det.label);
            }
            frames.push(detections);
        }
        Ok(Self { frames })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("in detection script {}", path.display()))
    }

    fn for_frame(&self, number: u64) -> Vec<Detection> {
        number
            .checked_sub(1)
            .and_then(|idx| self.frames.get(idx as usize))
            .cloned()
            .unwrap_or_default()
    }
}

/// Backend that replays a `DetectionScript`.
pub struct ScriptedBackend {
    script: DetectionScript,
}

impl ScriptedBackend {
    pub fn new(script: DetectionScript) -> Self {
        Self { script }
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        Ok(self.script.for_frame(frame.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    #[test]
    fn parses_json_lines_and_cleans_labels() -> Result<()> {
        let raw = r#"[{"label": "c2 - Yawning", "bbox": {"x1": 1, "y1": 2, "x2": 30, "y2": 40}}]

[{"label": "Texting", "bbox": {"x1": 0, "y1": 0, "x2": 5, "y2": 5}}, {"label": "Seatbelt", "bbox": {"x1": 5, "y1": 5, "x2": 9, "y2": 9}}]
"#;
        let script = DetectionScript::parse(raw)?;
        assert_eq!(script.len(), 3);

        let mut backend = ScriptedBackend::new(script);
        let first = backend.detect(&Frame::filled(2, 2, 1, [0, 0, 0])?)?;
        assert_eq!(
            first,
            vec![Detection {
                label: "Yawning".to_string(),
                bbox: BoundingBox::new(1, 2, 30, 40),
            }]
        );
        assert!(backend.detect(&Frame::filled(2, 2, 2, [0, 0, 0])?)?.is_empty());
        let third = backend.detect(&Frame::filled(2, 2, 3, [0, 0, 0])?)?;
        assert_eq!(third.len(), 2);
        assert_eq!(third[1].label, "Seatbelt");
        assert!(backend.detect(&Frame::filled(2, 2, 4, [0, 0, 0])?)?.is_empty());
        Ok(())
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = DetectionScript::parse("[]\n{not json}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
