//! demo - end-to-end synthetic run for Driver Sentinel
//!
//! Replays a scripted detection sequence over a `stub://` clip: the driver
//! yawns for a stretch, looks away, yawns again, and keeps a seatbelt box
//! (untracked) visible throughout. The terminal bell stands in for the siren.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use driver_sentinel::ui::Ui;
use driver_sentinel::{
    process_video, AlarmController, BehaviorTracker, BellSink, BoundingBox, Detection,
    DetectionScript, EscalationSettings, FileConfig, FileSource, PresenterOptions,
    ScriptedBackend, TerminalPresenter, ThresholdTable,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frames per second for the synthetic clip.
    #[arg(long, default_value_t = 2)]
    fps: u32,
    /// Seconds of yawning before the driver looks away.
    #[arg(long, default_value_t = 10)]
    yawn_secs: u32,
    /// Seconds with no tracked behavior between the two yawning stretches.
    #[arg(long, default_value_t = 3)]
    pause_secs: u32,
    /// Ring the terminal bell while the alarm is sounding.
    #[arg(long)]
    bell: bool,
    /// Output directory for annotated frames.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let yawn = Detection::new("c4 - Yawning", BoundingBox::new(120, 60, 200, 140));
    let seatbelt = Detection::new("Seatbelt", BoundingBox::new(80, 150, 240, 230));
    let mut script = DetectionScript::default();
    let stretch = |secs: u32| (0..secs * args.fps);
    for _ in stretch(args.yawn_secs) {
        script.push_frame(vec![yawn.clone(), seatbelt.clone()]);
    }
    for _ in stretch(args.pause_secs) {
        script.push_frame(vec![seatbelt.clone()]);
    }
    for _ in stretch(2) {
        script.push_frame(vec![yawn.clone(), seatbelt.clone()]);
    }
    let total_frames = script.len();

    let mut source = FileSource::open(FileConfig {
        path: format!("stub://demo?frames={}&fps={}", total_frames, args.fps),
        ..FileConfig::default()
    })?;
    let mut detector = ScriptedBackend::new(script);
    let mut tracker = BehaviorTracker::new(ThresholdTable::default());

    let settings = EscalationSettings {
        interval: Duration::from_millis(250),
        ..EscalationSettings::default()
    };
    let mut alarm = if args.bell {
        AlarmController::new(Arc::new(BellSink), settings)
    } else {
        AlarmController::disabled(settings)
    };

    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(None, std::io::stderr().is_terminal(), !stdout_is_tty);
    let mut presenter = TerminalPresenter::new(
        std::io::stdout(),
        &ui,
        PresenterOptions {
            frames_out: args.out.clone(),
            frame_stride: u64::from(args.fps),
            report_path: args.out.as_ref().map(|dir| dir.join("summary.json")),
            ansi: stdout_is_tty,
        },
    )?;

    let report = process_video(
        &mut source,
        &mut detector,
        &mut tracker,
        &mut alarm,
        &mut presenter,
        5,
    )?;
    log::info!(
        "demo: {} frames, {} alarm activation(s), risky behaviors: {}",
        report.frames,
        report.alarm_activations,
        report
            .summary
            .rows
            .iter()
            .filter(|row| row.alarm_triggered)
            .map(|row| row.behavior.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}
