//! Detection overlays drawn in place on RGB frames.

use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;
use crate::tracker::{DetectionStatus, FrameAssessment};

pub const GREEN: [u8; 3] = [0, 255, 0];
pub const CYAN: [u8; 3] = [0, 255, 255];
pub const RED: [u8; 3] = [255, 0, 0];
pub const YELLOW: [u8; 3] = [255, 255, 0];

const TAB_HEIGHT: i32 = 8;
const TAB_CHAR_WIDTH: i32 = 7;
const ALERT_BAR_HEIGHT: u32 = 6;

/// How one detection box is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxStyle {
    /// Tracked label still below its threshold.
    Tracked,
    /// Label without a threshold.
    Untracked,
    /// Over threshold, red phase of the blink.
    AlertRed,
    /// Over threshold, yellow phase of the blink.
    AlertYellow,
}

impl BoxStyle {
    pub fn for_status(status: DetectionStatus, frame_number: u64, blink_period: u64) -> Self {
        match status {
            DetectionStatus::Untracked => BoxStyle::Untracked,
            DetectionStatus::BelowThreshold => BoxStyle::Tracked,
            DetectionStatus::OverThreshold if blink_is_red(frame_number, blink_period) => {
                BoxStyle::AlertRed
            }
            DetectionStatus::OverThreshold => BoxStyle::AlertYellow,
        }
    }

    pub fn color(self) -> [u8; 3] {
        match self {
            BoxStyle::Tracked => GREEN,
            BoxStyle::Untracked => CYAN,
            BoxStyle::AlertRed => RED,
            BoxStyle::AlertYellow => YELLOW,
        }
    }

    pub fn thickness(self) -> u32 {
        match self {
            BoxStyle::AlertRed | BoxStyle::AlertYellow => 4,
            BoxStyle::Tracked | BoxStyle::Untracked => 2,
        }
    }
}

/// Blink phase: red for `period` frames, then yellow for `period` frames.
pub fn blink_is_red(frame_number: u64, period: u64) -> bool {
    (frame_number / period.max(1)) % 2 == 0
}

/// Draw every detection of one frame using its assessed status.
pub fn annotate(
    frame: &mut Frame,
    detections: &[Detection],
    assessment: &FrameAssessment,
    blink_period: u64,
) {
    let number = frame.number;
    for (det, status) in detections.iter().zip(&assessment.statuses) {
        let style = BoxStyle::for_status(*status, number, blink_period);
        draw_box(frame, &det.bbox, style.color(), style.thickness());
        draw_label_tab(frame, &det.bbox, &det.label, style.color());
    }
    if assessment.is_risky() {
        draw_alert_bar(frame, RED);
    }
}

/// Rectangle outline, clamped to the frame.
pub fn draw_box(frame: &mut Frame, bbox: &BoundingBox, rgb: [u8; 3], thickness: u32) {
    if frame.width == 0 || frame.height == 0 {
        return;
    }
    let max_x = frame.width as i32 - 1;
    let max_y = frame.height as i32 - 1;
    let x1 = bbox.x1.clamp(0, max_x);
    let y1 = bbox.y1.clamp(0, max_y);
    let x2 = bbox.x2.clamp(0, max_x);
    let y2 = bbox.y2.clamp(0, max_y);
    if x1 > x2 || y1 > y2 {
        return;
    }

    for t in 0..thickness as i32 {
        let (top, bottom) = (y1 + t, y2 - t);
        let (left, right) = (x1 + t, x2 - t);
        if top > bottom || left > right {
            break;
        }
        for x in left..=right {
            set_rgb(frame, x, top, rgb);
            set_rgb(frame, x, bottom, rgb);
        }
        for y in top..=bottom {
            set_rgb(frame, left, y, rgb);
            set_rgb(frame, right, y, rgb);
        }
    }
}

/// Filled tab above the box, sized to the label, standing in for the caption.
fn draw_label_tab(frame: &mut Frame, bbox: &BoundingBox, label: &str, rgb: [u8; 3]) {
    let chars = i32::try_from(label.chars().count()).unwrap_or(i32::MAX);
    let width = chars.saturating_mul(TAB_CHAR_WIDTH).saturating_add(4);
    let (max_x, max_y) = (frame.width as i32, frame.height as i32);
    let bottom = bbox.y1.saturating_sub(2).clamp(0, max_y);
    let top = bottom.saturating_sub(TAB_HEIGHT).max(0);
    let left = bbox.x1.clamp(0, max_x);
    let right = bbox.x1.saturating_add(width).clamp(0, max_x);
    for y in top..bottom {
        for x in left..right {
            set_rgb(frame, x, y, rgb);
        }
    }
}

fn draw_alert_bar(frame: &mut Frame, rgb: [u8; 3]) {
    for y in 0..ALERT_BAR_HEIGHT.min(frame.height) as i32 {
        for x in 0..frame.width as i32 {
            set_rgb(frame, x, y, rgb);
        }
    }
}

fn set_rgb(frame: &mut Frame, x: i32, y: i32, rgb: [u8; 3]) {
    if x < 0 || y < 0 || x >= frame.width as i32 || y >= frame.height as i32 {
        return;
    }
    let idx = (y as usize * frame.width as usize + x as usize) * 3;
    let pixels = frame.pixels_mut();
    pixels[idx..idx + 3].copy_from_slice(&rgb);
}
