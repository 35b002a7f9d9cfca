//! Per-video processing loop.
//!
//! `process_video` drives one upload end to end: decode a frame, run the
//! detector, accumulate durations, drive the alarm, draw overlays, hand the
//! frame to the presenter. When the stream ends (or any step fails) the alarm
//! is stopped before the summary is produced or the error is returned.

use anyhow::Result;

use crate::alarm::AlarmController;
use crate::detect::DetectorBackend;
use crate::ingest::FrameSource;
use crate::overlay;
use crate::present::{FrameUpdate, Presenter};
use crate::summary::BehaviorSummary;
use crate::tracker::BehaviorTracker;

/// Outcome of one processed video.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub frames: u64,
    /// Idle → Sounding transitions during this run.
    pub alarm_activations: u64,
    pub summary: BehaviorSummary,
}

pub fn process_video<S, D, P>(
    source: &mut S,
    detector: &mut D,
    tracker: &mut BehaviorTracker,
    alarm: &mut AlarmController,
    presenter: &mut P,
    blink_period: u64,
) -> Result<RunReport>
where
    S: FrameSource + ?Sized,
    D: DetectorBackend + ?Sized,
    P: Presenter + ?Sized,
{
    let activations_before = alarm.activations();
    let result = run_frames(source, detector, tracker, alarm, presenter, blink_period);
    alarm.stop();
    let frames = result?;

    let summary = tracker.summary();
    presenter.summary(&summary)?;
    log::info!(
        "processed {} frames, {} alarm activation(s)",
        frames,
        alarm.activations() - activations_before
    );
    Ok(RunReport {
        frames,
        alarm_activations: alarm.activations() - activations_before,
        summary,
    })
}

fn run_frames<S, D, P>(
    source: &mut S,
    detector: &mut D,
    tracker: &mut BehaviorTracker,
    alarm: &mut AlarmController,
    presenter: &mut P,
    blink_period: u64,
) -> Result<u64>
where
    S: FrameSource + ?Sized,
    D: DetectorBackend + ?Sized,
    P: Presenter + ?Sized,
{
    let delta = source.frame_delta_secs();
    log::debug!("frame delta {:.4}s via {} detector", delta, detector.name());
    let mut frames = 0u64;

    while let Some(mut frame) = source.next_frame()? {
        frames += 1;
        let detections = detector.detect(&frame)?;
        let assessment = tracker.update(&detections, delta);

        match &assessment.risky {
            Some(risky) => {
                if !alarm.is_sounding() && alarm.start() {
                    log::warn!(
                        "frame {}: {} over threshold ({:.1}s / {:.1}s)",
                        frame.number,
                        risky.label,
                        risky.elapsed_secs,
                        risky.threshold_secs
                    );
                }
            }
            None => {
                alarm.stop();
            }
        }

        overlay::annotate(&mut frame, &detections, &assessment, blink_period);
        presenter.frame(&FrameUpdate {
            frame: &frame,
            detections: &detections,
            assessment: &assessment,
            alarm: alarm.state(),
        })?;
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::EscalationSettings;
    use crate::detect::{BoundingBox, Detection, DetectionScript, ScriptedBackend};
    use crate::frame::Frame;
    use crate::tracker::ThresholdTable;
    use anyhow::anyhow;

    struct CountedSource {
        remaining: u64,
        next: u64,
        fail_at: Option<u64>,
    }

    impl FrameSource for CountedSource {
        fn frame_delta_secs(&self) -> f64 {
            1.0
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            self.next += 1;
            if self.fail_at == Some(self.next) {
                return Err(anyhow!("decode failed at frame {}", self.next));
            }
            Frame::filled(16, 16, self.next, [0, 0, 0]).map(Some)
        }
    }

    #[derive(Default)]
    struct NullPresenter {
        frames: u64,
        summaries: u64,
    }

    impl Presenter for NullPresenter {
        fn frame(&mut self, _update: &FrameUpdate<'_>) -> Result<()> {
            self.frames += 1;
            Ok(())
        }

        fn summary(&mut self, _summary: &BehaviorSummary) -> Result<()> {
            self.summaries += 1;
            Ok(())
        }
    }

    fn texting(frames: usize) -> ScriptedBackend {
        let det = Detection::new("Texting", BoundingBox::new(1, 1, 8, 8));
        ScriptedBackend::new(DetectionScript::from_frames(vec![vec![det]; frames]))
    }

    #[test]
    fn counts_frames_and_summarizes_once() -> Result<()> {
        let mut source = CountedSource {
            remaining: 4,
            next: 0,
            fail_at: None,
        };
        let mut tracker = BehaviorTracker::new(ThresholdTable::new([("Texting", 3.0)])?);
        let mut alarm = AlarmController::disabled(EscalationSettings::default());
        let mut presenter = NullPresenter::default();

        let report = process_video(
            &mut source,
            &mut texting(4),
            &mut tracker,
            &mut alarm,
            &mut presenter,
            5,
        )?;
        assert_eq!(report.frames, 4);
        assert_eq!(presenter.frames, 4);
        assert_eq!(presenter.summaries, 1);
        assert_eq!(report.summary.rows.len(), 1);
        assert!(report.summary.rows[0].alarm_triggered);
        assert_eq!(report.alarm_activations, 0);
        Ok(())
    }

    #[test]
    fn source_error_skips_summary() -> Result<()> {
        let mut source = CountedSource {
            remaining: 4,
            next: 0,
            fail_at: Some(3),
        };
        let mut tracker = BehaviorTracker::new(ThresholdTable::default());
        let mut alarm = AlarmController::disabled(EscalationSettings::default());
        let mut presenter = NullPresenter::default();

        let err = process_video(
            &mut source,
            &mut texting(4),
            &mut tracker,
            &mut alarm,
            &mut presenter,
            5,
        )
        .unwrap_err();
        assert!(err.to_string().contains("frame 3"));
        assert_eq!(presenter.frames, 2);
        assert_eq!(presenter.summaries, 0);
        assert!(!alarm.is_sounding());
        Ok(())
    }
}
