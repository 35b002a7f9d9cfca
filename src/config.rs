use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alarm::EscalationSettings;
use crate::frame::DEFAULT_FALLBACK_FPS;
use crate::ingest::FileConfig;
use crate::tracker::{ThresholdTable, TieBreak, DEFAULT_THRESHOLDS};

const DEFAULT_SOUND_PATH: &str = "siren.wav";
const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_BLINK_PERIOD: u64 = 5;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_NMS: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SentinelConfigFile {
    thresholds: Option<BTreeMap<String, f64>>,
    tie_break: Option<TieBreak>,
    alarm: Option<AlarmConfigFile>,
    video: Option<VideoConfigFile>,
    overlay: Option<OverlayConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlarmConfigFile {
    sound_path: Option<PathBuf>,
    min_volume: Option<f32>,
    max_volume: Option<f32>,
    volume_step: Option<f32>,
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct VideoConfigFile {
    fallback_fps: Option<f64>,
    allowed_extensions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OverlayConfigFile {
    blink_period_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    class_names: Option<Vec<String>>,
    confidence_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub thresholds: ThresholdTable,
    pub tie_break: TieBreak,
    pub alarm: AlarmSettings,
    pub video: VideoSettings,
    pub blink_period_frames: u64,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct AlarmSettings {
    pub sound_path: PathBuf,
    pub escalation: EscalationSettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub fallback_fps: f64,
    pub allowed_extensions: Vec<String>,
}

impl VideoSettings {
    /// Frame source configuration for `path`.
    pub fn file_config(&self, path: &str) -> FileConfig {
        FileConfig {
            path: path.to_string(),
            fallback_fps: self.fallback_fps,
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: PathBuf,
    pub class_names: Vec<String>,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub input_size: u32,
}

#[cfg(feature = "backend-tract")]
impl DetectorSettings {
    pub fn tract_settings(&self) -> crate::detect::TractSettings {
        crate::detect::TractSettings {
            input_size: self.input_size,
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            class_names: self.class_names.clone(),
        }
    }
}

impl SentinelConfig {
    /// Load from the file named by `SENTINEL_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Result<Self> {
        let thresholds = match file.thresholds {
            Some(entries) => ThresholdTable::new(entries)?,
            None => ThresholdTable::default(),
        };
        let alarm_file = file.alarm.unwrap_or_default();
        let defaults = EscalationSettings::default();
        let alarm = AlarmSettings {
            sound_path: alarm_file
                .sound_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUND_PATH)),
            escalation: EscalationSettings {
                min_volume: alarm_file.min_volume.unwrap_or(defaults.min_volume),
                max_volume: alarm_file.max_volume.unwrap_or(defaults.max_volume),
                volume_step: alarm_file.volume_step.unwrap_or(defaults.volume_step),
                interval: alarm_file
                    .interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.interval),
            },
        };
        let video_file = file.video.unwrap_or_default();
        let video = VideoSettings {
            fallback_fps: video_file.fallback_fps.unwrap_or(DEFAULT_FALLBACK_FPS),
            allowed_extensions: video_file
                .allowed_extensions
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()),
        };
        let blink_period_frames = file
            .overlay
            .and_then(|overlay| overlay.blink_period_frames)
            .unwrap_or(DEFAULT_BLINK_PERIOD);
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            model_path: detector_file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            class_names: detector_file.class_names.unwrap_or_else(|| {
                DEFAULT_THRESHOLDS
                    .iter()
                    .map(|(label, _)| label.to_string())
                    .collect()
            }),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE),
            nms_threshold: detector_file.nms_threshold.unwrap_or(DEFAULT_NMS),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };
        Ok(Self {
            thresholds,
            tie_break: file.tie_break.unwrap_or_default(),
            alarm,
            video,
            blink_period_frames,
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SENTINEL_SIREN_PATH") {
            if !path.trim().is_empty() {
                self.alarm.sound_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("SENTINEL_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = PathBuf::from(path);
            }
        }
        if let Ok(raw) = std::env::var("SENTINEL_THRESHOLDS") {
            let parsed = parse_thresholds(&raw)?;
            if !parsed.is_empty() {
                self.thresholds = ThresholdTable::new(parsed)?;
            }
        }
        if let Ok(fps) = std::env::var("SENTINEL_FALLBACK_FPS") {
            self.video.fallback_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_FALLBACK_FPS must be a number"))?;
        }
        if let Ok(period) = std::env::var("SENTINEL_BLINK_PERIOD") {
            self.blink_period_frames = period
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_BLINK_PERIOD must be an integer number of frames"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.thresholds.is_empty() {
            return Err(anyhow!("thresholds must name at least one behavior"));
        }
        self.alarm.escalation.validate()?;
        if !(self.video.fallback_fps.is_finite() && self.video.fallback_fps > 0.0) {
            return Err(anyhow!("video.fallback_fps must be greater than zero"));
        }
        self.video.allowed_extensions = self
            .video
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if self.video.allowed_extensions.is_empty() {
            return Err(anyhow!("video.allowed_extensions must not be empty"));
        }
        if self.blink_period_frames == 0 {
            return Err(anyhow!("overlay.blink_period_frames must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold)
            || !(0.0..=1.0).contains(&self.detector.nms_threshold)
        {
            return Err(anyhow!("detector thresholds must be within 0..=1"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// Parse `Label=secs` pairs separated by commas.
fn parse_thresholds(value: &str) -> Result<Vec<(String, f64)>> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (label, secs) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("SENTINEL_THRESHOLDS entry '{}' must be Label=secs", entry))?;
            let secs: f64 = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_THRESHOLDS entry '{}' has a bad number", entry))?;
            Ok((label.trim().to_string(), secs))
        })
        .collect()
}
