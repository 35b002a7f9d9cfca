//! Driver Sentinel
//!
//! This crate watches a recorded in-cab video for risky driver behaviors and
//! raises an escalating audible alarm while any of them has lasted too long.
//!
//! # Architecture
//!
//! Each uploaded video is processed as one sequential run:
//!
//! 1. **Ingest**: frames are decoded in order; each frame stands for `1 / fps`
//!    seconds of footage.
//! 2. **Detect**: a detector backend returns labeled boxes for the frame.
//! 3. **Track**: per-label elapsed time accumulates over the whole video and
//!    never resets; a label is risky once it reaches its threshold.
//! 4. **Alarm**: the alarm sounds while the current frame has a risky label and
//!    goes idle on the first frame without one.
//! 5. **Present**: boxes, a blinking highlight and an alert banner are drawn,
//!    and a summary table is printed when the video ends.
//!
//! # Module Structure
//!
//! - `frame`: RGB frames and frame-rate to time-step conversion
//! - `ingest`: Frame sources (local files, synthetic `stub://` clips)
//! - `detect`: Detector backends (scripted replay, ONNX via tract)
//! - `tracker`: Threshold table and cumulative duration accounting
//! - `alarm` / `audio`: Escalating siren state machine and playback sinks
//! - `overlay` / `present` / `ui`: Drawing, live terminal view, summary output
//! - `pipeline`: The per-video loop tying the above together
//! - `config`: File and environment configuration

pub mod alarm;
pub mod audio;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod pipeline;
pub mod present;
pub mod summary;
pub mod tracker;
pub mod ui;

pub use alarm::{AlarmController, AlarmState, EscalationSettings};
pub use audio::{AlertSink, AlertSound, BellSink};
#[cfg(feature = "audio-rodio")]
pub use audio::RodioSink;
pub use config::SentinelConfig;
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectionScript, DetectorBackend, ScriptedBackend,
};
pub use frame::{frame_delta_secs, Frame};
pub use ingest::{FileConfig, FileSource, FrameSource};
pub use pipeline::{process_video, RunReport};
pub use present::{FrameUpdate, Presenter, PresenterOptions, TerminalPresenter};
pub use summary::{BehaviorSummary, SummaryRow};
pub use tracker::{
    BehaviorTracker, DetectionStatus, FrameAssessment, RiskyBehavior, ThresholdTable, TieBreak,
};
