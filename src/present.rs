//! Presentation layer.
//!
//! The pipeline hands every annotated frame and the final summary to a
//! `Presenter`. `TerminalPresenter` drives the live terminal view, optionally
//! dumps annotated frames as images, and prints the summary table.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::alarm::AlarmState;
use crate::detect::Detection;
use crate::frame::Frame;
use crate::summary::BehaviorSummary;
use crate::tracker::FrameAssessment;
use crate::ui::{LiveView, Ui};

/// Everything the presentation layer sees for one processed frame.
pub struct FrameUpdate<'a> {
    /// Frame with overlays already drawn.
    pub frame: &'a Frame,
    pub detections: &'a [Detection],
    pub assessment: &'a FrameAssessment,
    pub alarm: AlarmState,
}

impl FrameUpdate<'_> {
    /// Banner text, present only while a behavior is over threshold.
    pub fn banner(&self) -> Option<String> {
        self.assessment
            .risky
            .as_ref()
            .map(|risky| format!("ALERT: {} detected!", risky.label))
    }

    /// `(ratio, "elapsed s / threshold s")` for the current risky label.
    pub fn progress(&self) -> Option<(f64, String)> {
        self.assessment.risky.as_ref().map(|risky| {
            (
                risky.progress(),
                format!("{:.1}s / {:.1}s", risky.elapsed_secs, risky.threshold_secs),
            )
        })
    }
}

pub trait Presenter {
    fn frame(&mut self, update: &FrameUpdate<'_>) -> Result<()>;

    fn summary(&mut self, summary: &BehaviorSummary) -> Result<()>;
}

/// Output options for `TerminalPresenter`.
#[derive(Clone, Debug, Default)]
pub struct PresenterOptions {
    /// Directory for annotated frame snapshots.
    pub frames_out: Option<PathBuf>,
    /// Save every n-th frame (0 or 1 saves all).
    pub frame_stride: u64,
    /// JSON summary destination.
    pub report_path: Option<PathBuf>,
    /// Highlight triggered summary rows with ANSI colour.
    pub ansi: bool,
}

pub struct TerminalPresenter<W: Write> {
    out: W,
    live: LiveView,
    options: PresenterOptions,
    frames_written: u64,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W, ui: &Ui, options: PresenterOptions) -> Result<Self> {
        if let Some(dir) = &options.frames_out {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating frame output directory {}", dir.display()))?;
        }
        Ok(Self {
            out,
            live: ui.live_view(),
            options,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn save_frame(&mut self, frame: &Frame) -> Result<()> {
        let Some(dir) = &self.options.frames_out else {
            return Ok(());
        };
        let stride = self.options.frame_stride.max(1);
        if frame.number.saturating_sub(1) % stride != 0 {
            return Ok(());
        }
        let path = dir.join(format!("frame_{:06}.jpg", frame.number));
        frame
            .to_image()?
            .save(&path)
            .with_context(|| format!("writing annotated frame {}", path.display()))?;
        self.frames_written += 1;
        Ok(())
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn frame(&mut self, update: &FrameUpdate<'_>) -> Result<()> {
        self.live.tick_frame(update.frame.number);
        if !update.detections.is_empty() {
            log::debug!(
                "frame {}: {} detection(s), alarm {:?}",
                update.frame.number,
                update.detections.len(),
                update.alarm
            );
        }
        match (&update.assessment.risky, update.progress()) {
            (Some(risky), Some((ratio, text))) => self.live.show_alert(&risky.label, ratio, &text),
            _ => self.live.clear_alert(),
        }
        self.save_frame(update.frame)
    }

    fn summary(&mut self, summary: &BehaviorSummary) -> Result<()> {
        self.live.finish();
        writeln!(self.out, "Detected Risky Behaviors Summary")?;
        write!(self.out, "{}", summary.render_table(self.options.ansi))?;
        if let Some(path) = &self.options.report_path {
            summary.write_json(path)?;
            writeln!(self.out, "summary report: {}", path.display())?;
        }
        writeln!(self.out, "Video processed successfully.")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::summary::SummaryRow;
    use crate::tracker::{DetectionStatus, RiskyBehavior};

    fn risky_assessment() -> FrameAssessment {
        FrameAssessment {
            statuses: vec![DetectionStatus::OverThreshold],
            risky: Some(RiskyBehavior {
                label: "Texting".to_string(),
                elapsed_secs: 8.3,
                threshold_secs: 8.0,
            }),
        }
    }

    #[test]
    fn banner_and_progress_only_while_risky() -> Result<()> {
        let frame = Frame::filled(4, 4, 1, [0, 0, 0])?;
        let detections = [Detection::new("Texting", BoundingBox::new(0, 0, 2, 2))];
        let assessment = risky_assessment();
        let update = FrameUpdate {
            frame: &frame,
            detections: &detections,
            assessment: &assessment,
            alarm: AlarmState::Sounding,
        };
        assert_eq!(update.banner().as_deref(), Some("ALERT: Texting detected!"));
        assert_eq!(update.progress(), Some((1.0, "8.3s / 8.0s".to_string())));

        let calm = FrameAssessment::default();
        let update = FrameUpdate {
            frame: &frame,
            detections: &[],
            assessment: &calm,
            alarm: AlarmState::Idle,
        };
        assert!(update.banner().is_none());
        assert!(update.progress().is_none());
        Ok(())
    }

    #[test]
    fn writes_strided_frames_and_summary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let options = PresenterOptions {
            frames_out: Some(dir.path().join("frames")),
            frame_stride: 2,
            report_path: Some(dir.path().join("summary.json")),
            ansi: false,
        };
        let mut presenter = TerminalPresenter::new(Vec::new(), &Ui::plain(), options)?;
        let calm = FrameAssessment::default();
        for number in 1..=5 {
            let frame = Frame::filled(8, 8, number, [10, 10, 10])?;
            presenter.frame(&FrameUpdate {
                frame: &frame,
                detections: &[],
                assessment: &calm,
                alarm: AlarmState::Idle,
            })?;
        }
        assert_eq!(presenter.frames_written(), 3);
        assert!(dir.path().join("frames/frame_000003.jpg").is_file());
        assert!(!dir.path().join("frames/frame_000002.jpg").exists());

        let summary = BehaviorSummary {
            rows: vec![SummaryRow::new("Texting", 9.0, true)],
        };
        presenter.summary(&summary)?;
        let text = String::from_utf8(presenter.into_inner())?;
        assert!(text.contains("! Texting"));
        assert!(text.contains("Video processed successfully."));
        assert!(dir.path().join("summary.json").is_file());
        Ok(())
    }
}
