use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates (`x1,y1` top-left, `x2,y2` bottom-right).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Intersection over union; 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = BoundingBox::new(ix1, iy1, ix2, iy2).area();
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// One labeled box produced by a detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Build a detection, normalizing the raw model class name.
    pub fn new(raw_label: &str, bbox: BoundingBox) -> Self {
        Self {
            label: clean_label(raw_label),
            bbox,
        }
    }
}

/// Strip dataset prefixes such as `"3 - Yawning"` down to `"Yawning"`.
///
/// Only the text after the last `" - "` separator is kept.
pub fn clean_label(raw: &str) -> String {
    match raw.rsplit_once(" - ") {
        Some((_, label)) => label.trim().to_string(),
        None => raw.to_string(),
    }
}
