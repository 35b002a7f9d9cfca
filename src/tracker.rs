//! Behavior duration tracking.
//!
//! `BehaviorTracker` keeps, per tracked label, the cumulative seconds that label
//! has been detected over the whole video. Accumulators never decay or reset
//! while a video is being processed, so once a label reaches its threshold
//! every later frame containing it is risky.
//!
//! Labels missing from the `ThresholdTable` are reported as untracked and never
//! contribute to risk.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::summary::{BehaviorSummary, SummaryRow};

/// Default thresholds (seconds) for the driver-behavior model classes.
pub const DEFAULT_THRESHOLDS: &[(&str, f64)] = &[
    ("Eyes Closed", 3.0),
    ("Nodding Off", 3.0),
    ("Texting", 8.0),
    ("Talking on the phone", 8.0),
    ("Yawning", 8.0),
    ("Drinking", 8.0),
    ("Operating the Radio", 8.0),
    ("Reaching Behind", 8.0),
    ("Hair and Makeup", 8.0),
    ("Talking to Passenger", 8.0),
];

/// Static mapping from tracked label to its persistence threshold in seconds.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdTable {
    entries: HashMap<String, f64>,
}

impl ThresholdTable {
    /// Build a table. Every threshold must be finite and positive.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        for (label, secs) in entries {
            let label = label.into();
            if label.trim().is_empty() {
                return Err(anyhow!("threshold label must not be empty"));
            }
            if !secs.is_finite() || secs <= 0.0 {
                return Err(anyhow!(
                    "threshold for '{}' must be a positive number of seconds, got {}",
                    label,
                    secs
                ));
            }
            map.insert(label, secs);
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tracked labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_THRESHOLDS
                .iter()
                .map(|(label, secs)| (label.to_string(), *secs))
                .collect(),
        }
    }
}

/// How to pick the reported label when several are over threshold in one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First over-threshold detection in detector output order.
    #[default]
    FirstEncountered,
    /// Largest `elapsed - threshold`; ties fall back to encounter order.
    GreatestExcess,
}

/// Per-detection classification for overlay styling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionStatus {
    /// Label is not in the threshold table.
    Untracked,
    /// Tracked, accumulated time still below threshold.
    BelowThreshold,
    /// Tracked, accumulated time at or above threshold.
    OverThreshold,
}

/// The label driving the alert for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskyBehavior {
    pub label: String,
    /// Accumulated seconds after this frame's increments.
    pub elapsed_secs: f64,
    pub threshold_secs: f64,
}

impl RiskyBehavior {
    /// `elapsed / threshold`, capped at 1.0.
    pub fn progress(&self) -> f64 {
        (self.elapsed_secs / self.threshold_secs).min(1.0)
    }
}

/// Outcome of one `BehaviorTracker::update` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAssessment {
    /// One entry per input detection, same order.
    pub statuses: Vec<DetectionStatus>,
    pub risky: Option<RiskyBehavior>,
}

impl FrameAssessment {
    pub fn is_risky(&self) -> bool {
        self.risky.is_some()
    }
}

/// Cumulative per-label elapsed-time accumulator for one video.
#[derive(Debug)]
pub struct BehaviorTracker {
    thresholds: ThresholdTable,
    tie_break: TieBreak,
    // First-observed order is kept for the summary.
    totals: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl BehaviorTracker {
    pub fn new(thresholds: ThresholdTable) -> Self {
        Self {
            thresholds,
            tie_break: TieBreak::default(),
            totals: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    /// Account for one frame.
    ///
    /// Each detection of a tracked label adds `frame_delta_secs` to that label,
    /// so two boxes of the same label in one frame count twice.
    pub fn update(&mut self, detections: &[Detection], frame_delta_secs: f64) -> FrameAssessment {
        let mut statuses = Vec::with_capacity(detections.len());
        let mut over: Vec<&str> = Vec::new();

        for det in detections {
            let Some(threshold) = self.thresholds.get(&det.label) else {
                statuses.push(DetectionStatus::Untracked);
                continue;
            };
            let elapsed = self.accumulate(&det.label, frame_delta_secs);
            // Reaching the threshold counts: 8 one-second detections trip an 8s limit.
            if elapsed >= threshold {
                statuses.push(DetectionStatus::OverThreshold);
                if !over.contains(&det.label.as_str()) {
                    over.push(&det.label);
                }
            } else {
                statuses.push(DetectionStatus::BelowThreshold);
            }
        }

        let risky = self.pick_risky(&over);
        FrameAssessment { statuses, risky }
    }

    /// Accumulated seconds for `label`, 0.0 if never seen.
    pub fn elapsed(&self, label: &str) -> f64 {
        self.index
            .get(label)
            .map(|&idx| self.totals[idx].1)
            .unwrap_or(0.0)
    }

    /// Labels accumulated so far with their totals, in first-observed order.
    pub fn totals(&self) -> impl Iterator<Item = (&str, f64)> {
        self.totals.iter().map(|(label, secs)| (label.as_str(), *secs))
    }

    /// End-of-video report: one row per accumulated label.
    pub fn summary(&self) -> BehaviorSummary {
        let rows = self
            .totals()
            .map(|(label, secs)| {
                let threshold = self.thresholds.get(label).unwrap_or(f64::INFINITY);
                SummaryRow::new(label, secs, secs >= threshold)
            })
            .collect();
        BehaviorSummary { rows }
    }

    fn accumulate(&mut self, label: &str, delta: f64) -> f64 {
        let idx = match self.index.get(label) {
            Some(&idx) => idx,
            None => {
                self.totals.push((label.to_string(), 0.0));
                let idx = self.totals.len() - 1;
                self.index.insert(label.to_string(), idx);
                idx
            }
        };
        self.totals[idx].1 += delta;
        self.totals[idx].1
    }

    fn pick_risky(&self, over: &[&str]) -> Option<RiskyBehavior> {
        let mut candidates = over.iter().filter_map(|label| {
            let threshold = self.thresholds.get(label)?;
            Some(RiskyBehavior {
                label: label.to_string(),
                elapsed_secs: self.elapsed(label),
                threshold_secs: threshold,
            })
        });
        match self.tie_break {
            TieBreak::FirstEncountered => candidates.next(),
            TieBreak::GreatestExcess => candidates.fold(None, |best: Option<RiskyBehavior>, cand| {
                match best {
                    Some(b)
                        if b.elapsed_secs - b.threshold_secs
                            >= cand.elapsed_secs - cand.threshold_secs =>
                    {
                        Some(b)
                    }
                    _ => Some(cand),
                }
            }),
        }
    }
}
