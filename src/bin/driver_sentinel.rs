//! driver_sentinel - risky driver behavior monitor for recorded videos
//!
//! This tool:
//! 1. Decodes one uploaded video (mp4/avi/mov) frame by frame
//! 2. Runs a behavior detector on every frame
//! 3. Accumulates how long each tracked behavior has been seen
//! 4. Sounds an escalating siren while a behavior is over its threshold
//! 5. Prints a per-behavior summary when the video ends

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use driver_sentinel::audio::{AlertSink, AlertSound, BellSink};
use driver_sentinel::ui::Ui;
use driver_sentinel::{
    process_video, AlarmController, BackendRegistry, BehaviorTracker, DetectionScript,
    FileSource, PresenterOptions, ScriptedBackend, SentinelConfig, TerminalPresenter,
};

#[derive(Parser, Debug)]
#[command(
    name = "driver_sentinel",
    about = "Track risky driver behaviors in a video and sound an escalating alarm"
)]
struct Args {
    /// Video file to process (.mp4, .avi, .mov) or stub://name for a synthetic clip
    video: String,

    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "SENTINEL_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Detector backend (scripted|tract)
    #[arg(long, default_value = "scripted")]
    backend: String,

    /// JSON-lines detection script for the scripted backend
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,

    /// ONNX model for the tract backend (overrides config)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Siren clip (overrides config)
    #[arg(long, value_name = "PATH")]
    siren: Option<PathBuf>,

    /// Disable the siren entirely
    #[arg(long)]
    no_siren: bool,

    /// Write annotated frames as JPEG into this directory
    #[arg(long, value_name = "DIR")]
    frames_out: Option<PathBuf>,

    /// Keep every n-th annotated frame
    #[arg(long, default_value_t = 1)]
    frame_stride: u64,

    /// Write the summary table as JSON
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut cfg = {
        let _stage = ui.stage("Load config");
        SentinelConfig::load_from(args.config.as_deref())?
    };
    if let Some(model) = &args.model {
        cfg.detector.model_path = model.clone();
    }
    if let Some(siren) = &args.siren {
        cfg.alarm.sound_path = siren.clone();
    }

    let registry = {
        let _stage = ui.stage("Load detector");
        build_registry(&args, &cfg)?
    };
    let detector = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend registered"))?;

    let mut source = {
        let _stage = ui.stage("Open video");
        FileSource::open(cfg.video.file_config(&args.video))?
    };

    let mut alarm = if args.no_siren {
        log::info!("alarm disabled by --no-siren");
        AlarmController::disabled(cfg.alarm.escalation.clone())
    } else {
        AlarmController::from_asset(
            &cfg.alarm.sound_path,
            cfg.alarm.escalation.clone(),
            open_sink,
        )
    };
    log::info!("tracking: {}", cfg.thresholds.labels().join(", "));
    let mut tracker = BehaviorTracker::new(cfg.thresholds.clone()).with_tie_break(cfg.tie_break);
    let mut presenter = TerminalPresenter::new(
        std::io::stdout(),
        &ui,
        PresenterOptions {
            frames_out: args.frames_out.clone(),
            frame_stride: args.frame_stride,
            report_path: args.report.clone(),
            ansi: stdout_is_tty,
        },
    )?;

    let report = {
        let _stage = ui.stage("Process video");
        let mut detector = detector
            .lock()
            .map_err(|_| anyhow!("detector backend lock poisoned"))?;
        process_video(
            &mut source,
            &mut *detector,
            &mut tracker,
            &mut alarm,
            &mut presenter,
            cfg.blink_period_frames,
        )?
    };

    let stats = source.stats();
    log::info!(
        "{}: {} frames decoded (stream fps {}), {} alarm activation(s), {} frame(s) saved",
        stats.path,
        stats.frames_decoded,
        stats
            .stream_fps
            .map(|fps| format!("{:.2}", fps))
            .unwrap_or_else(|| "unknown".to_string()),
        report.alarm_activations,
        presenter.frames_written()
    );
    Ok(())
}

fn build_registry(args: &Args, cfg: &SentinelConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match args.backend.as_str() {
        "scripted" => {
            let script = match &args.detections {
                Some(path) => DetectionScript::load(path)?,
                None => {
                    log::warn!("no --detections script given; every frame will be empty");
                    DetectionScript::default()
                }
            };
            registry.register(ScriptedBackend::new(script));
            registry.set_default("scripted")?;
        }
        "tract" => register_tract(&mut registry, cfg)?,
        other => return Err(anyhow!("unknown detector backend '{}'", other)),
    }
    log::info!("detector backends: {}", registry.list().join(", "));
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, cfg: &SentinelConfig) -> Result<()> {
    use driver_sentinel::detect::{DetectorBackend, TractBackend};

    let mut backend = TractBackend::new(&cfg.detector.model_path, cfg.detector.tract_settings())?;
    backend.warm_up()?;
    registry.register(backend);
    registry.set_default("tract")
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, cfg: &SentinelConfig) -> Result<()> {
    Err(anyhow!(
        "cannot load {}: rebuild with --features backend-tract",
        cfg.detector.model_path.display()
    ))
}

#[cfg(feature = "audio-rodio")]
fn open_sink(sound: &AlertSound) -> Result<Arc<dyn AlertSink>> {
    match driver_sentinel::audio::RodioSink::new(sound) {
        Ok(sink) => Ok(Arc::new(sink)),
        Err(e) => {
            log::warn!("audio output unavailable ({:#}); using terminal bell", e);
            Ok(Arc::new(BellSink))
        }
    }
}

#[cfg(not(feature = "audio-rodio"))]
fn open_sink(sound: &AlertSound) -> Result<Arc<dyn AlertSink>> {
    log::info!(
        "built without audio-rodio; {} will sound as the terminal bell",
        sound.path().display()
    );
    Ok(Arc::new(BellSink))
}
