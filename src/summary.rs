//! End-of-video behavior summary.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

const HIGHLIGHT_ON: &str = "\x1b[41;97m";
const HIGHLIGHT_OFF: &str = "\x1b[0m";

/// One row per accumulated behavior.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRow {
    pub behavior: String,
    /// Total accumulated seconds, rounded to 2 decimals.
    pub total_duration_secs: f64,
    /// Whether the total ever reached the behavior's threshold.
    pub alarm_triggered: bool,
}

impl SummaryRow {
    pub fn new(behavior: &str, total_secs: f64, alarm_triggered: bool) -> Self {
        Self {
            behavior: behavior.to_string(),
            total_duration_secs: round2(total_secs),
            alarm_triggered,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BehaviorSummary {
    pub rows: Vec<SummaryRow>,
}

impl BehaviorSummary {
    pub fn any_triggered(&self) -> bool {
        self.rows.iter().any(|row| row.alarm_triggered)
    }

    /// Render as a fixed-width text table.
    ///
    /// Triggered rows are distinguished either with an ANSI highlight
    /// (`ansi = true`) or with a leading `!` marker.
    pub fn render_table(&self, ansi: bool) -> String {
        const HEADERS: [&str; 3] = ["Behavior", "Total Duration (s)", "Alarm Triggered"];
        let behavior_width = self
            .rows
            .iter()
            .map(|row| row.behavior.chars().count())
            .chain(std::iter::once(HEADERS[0].len()))
            .max()
            .unwrap_or(HEADERS[0].len());

        let mut out = String::new();
        let _ = writeln!(
            out,
            "  {:<bw$}  {:>18}  {}",
            HEADERS[0],
            HEADERS[1],
            HEADERS[2],
            bw = behavior_width
        );
        let _ = writeln!(
            out,
            "  {}  {}  {}",
            "-".repeat(behavior_width),
            "-".repeat(18),
            "-".repeat(HEADERS[2].len())
        );
        for row in &self.rows {
            let line = format!(
                "{:<bw$}  {:>18.2}  {}",
                row.behavior,
                row.total_duration_secs,
                if row.alarm_triggered { "Yes" } else { "No" },
                bw = behavior_width
            );
            match (row.alarm_triggered, ansi) {
                (true, true) => {
                    let _ = writeln!(out, "  {HIGHLIGHT_ON}{line}{HIGHLIGHT_OFF}");
                }
                (true, false) => {
                    let _ = writeln!(out, "! {line}");
                }
                (false, _) => {
                    let _ = writeln!(out, "  {line}");
                }
            }
        }
        if self.rows.is_empty() {
            let _ = writeln!(out, "  (no tracked behaviors observed)");
        }
        out
    }

    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serialize summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing summary report to {}", path.display()))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
