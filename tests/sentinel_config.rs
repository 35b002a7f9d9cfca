use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use driver_sentinel::config::SentinelConfig;
use driver_sentinel::TieBreak;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_SIREN_PATH",
        "SENTINEL_MODEL_PATH",
        "SENTINEL_THRESHOLDS",
        "SENTINEL_FALLBACK_FPS",
        "SENTINEL_BLINK_PERIOD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "thresholds": {"Texting": 5, "Eyes Closed": 2.5},
        "tie_break": "greatest_excess",
        "alarm": {
            "sound_path": "/opt/sentinel/siren.wav",
            "min_volume": 0.3,
            "interval_ms": 250
        },
        "video": {
            "allowed_extensions": ["mp4", "MKV"]
        },
        "overlay": {"blink_period_frames": 3}
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_FALLBACK_FPS", "25");
    std::env::set_var("SENTINEL_MODEL_PATH", "/models/driver.onnx");

    let cfg = SentinelConfig::load().expect("load config");

    assert_eq!(cfg.thresholds.get("Texting"), Some(5.0));
    assert_eq!(cfg.thresholds.get("Eyes Closed"), Some(2.5));
    assert_eq!(cfg.thresholds.get("Yawning"), None);
    assert_eq!(cfg.tie_break, TieBreak::GreatestExcess);
    assert_eq!(cfg.alarm.sound_path, PathBuf::from("/opt/sentinel/siren.wav"));
    assert_eq!(cfg.alarm.escalation.min_volume, 0.3);
    assert_eq!(cfg.alarm.escalation.max_volume, 1.0);
    assert_eq!(cfg.alarm.escalation.interval, Duration::from_millis(250));
    assert_eq!(cfg.video.fallback_fps, 25.0);
    assert_eq!(cfg.video.allowed_extensions, vec!["mp4", "mkv"]);
    assert_eq!(cfg.blink_period_frames, 3);
    assert_eq!(cfg.detector.model_path, PathBuf::from("/models/driver.onnx"));

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentinelConfig::load().expect("load defaults");
    assert_eq!(cfg.thresholds.len(), 10);
    assert_eq!(cfg.thresholds.get("Eyes Closed"), Some(3.0));
    assert_eq!(cfg.thresholds.get("Nodding Off"), Some(3.0));
    assert_eq!(cfg.thresholds.get("Talking to Passenger"), Some(8.0));
    assert_eq!(cfg.alarm.sound_path, PathBuf::from("siren.wav"));
    assert_eq!(cfg.alarm.escalation.interval, Duration::from_millis(500));
    assert_eq!(cfg.video.fallback_fps, 30.0);
    assert_eq!(cfg.video.allowed_extensions, vec!["mp4", "avi", "mov"]);
    assert_eq!(cfg.blink_period_frames, 5);
    assert_eq!(cfg.tie_break, TieBreak::FirstEncountered);
}

#[test]
fn toml_config_and_threshold_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[alarm]
volume_step = 0.1

[detector]
class_names = ["Texting", "Yawning"]
input_size = 320
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_THRESHOLDS", "Texting=4, Yawning=6.5");
    std::env::set_var("SENTINEL_SIREN_PATH", "alarm.wav");

    let cfg = SentinelConfig::load_from(Some(file.path())).expect("load toml config");
    assert_eq!(cfg.alarm.escalation.volume_step, 0.1);
    assert_eq!(cfg.detector.class_names, vec!["Texting", "Yawning"]);
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.thresholds.len(), 2);
    assert_eq!(cfg.thresholds.get("Yawning"), Some(6.5));
    assert_eq!(cfg.alarm.sound_path, PathBuf::from("alarm.wav"));

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_BLINK_PERIOD", "0");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    std::env::set_var("SENTINEL_THRESHOLDS", "Texting=-1");
    assert!(SentinelConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"alarm": {"min_volume": 0.9, "max_volume": 0.5}}"#)
        .expect("write config");
    assert!(SentinelConfig::load_from(Some(file.path())).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"unknown": true}"#).expect("write config");
    assert!(SentinelConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
