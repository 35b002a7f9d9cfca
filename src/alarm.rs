//! Escalating siren alarm.
//!
//! `AlarmController` is a two-state machine (`Idle`, `Sounding`). Entering
//! `Sounding` spawns exactly one escalation task that repeatedly plays the
//! siren, raises the volume by a fixed step up to a ceiling, and waits one
//! interval. Leaving `Sounding` sends a stop signal to the task, joins it, and
//! silences the sink.
//!
//! `start()` while sounding and `stop()` while idle are no-ops. A controller
//! built without a usable siren asset is disabled: both calls do nothing.

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::audio::{AlertSink, AlertSound};

const DEFAULT_MIN_VOLUME: f32 = 0.2;
const DEFAULT_MAX_VOLUME: f32 = 1.0;
const DEFAULT_VOLUME_STEP: f32 = 0.05;
const DEFAULT_INTERVAL_MS: u64 = 500;

/// Volume ramp of the escalation loop.
#[derive(Clone, Debug, PartialEq)]
pub struct EscalationSettings {
    /// Volume of the first playback after `start()`.
    pub min_volume: f32,
    /// Ceiling the ramp never exceeds.
    pub max_volume: f32,
    /// Added after every playback.
    pub volume_step: f32,
    /// Wait between playbacks. Also bounds how long `stop()` may block.
    pub interval: Duration,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            min_volume: DEFAULT_MIN_VOLUME,
            max_volume: DEFAULT_MAX_VOLUME,
            volume_step: DEFAULT_VOLUME_STEP,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
        }
    }
}

impl EscalationSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_volume > 0.0 && self.min_volume <= self.max_volume && self.max_volume <= 1.0)
        {
            return Err(anyhow!(
                "alarm volumes must satisfy 0 < min_volume <= max_volume <= 1 (got {} / {})",
                self.min_volume,
                self.max_volume
            ));
        }
        if !(self.volume_step > 0.0 && self.volume_step.is_finite()) {
            return Err(anyhow!("alarm volume_step must be positive"));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("alarm interval must be greater than zero"));
        }
        Ok(())
    }

    /// Volume after `cycles` completed playbacks: `min(max, min + cycles * step)`.
    pub fn volume_after(&self, cycles: u64) -> f32 {
        (self.min_volume + cycles as f32 * self.volume_step).min(self.max_volume)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    Sounding,
}

/// Counters shared with the escalation task. Only the task writes them while
/// it runs; the controller resets them before spawning.
#[derive(Debug, Default)]
struct EscalationShared {
    volume_bits: AtomicU32,
    cycles: AtomicU64,
    live_loops: AtomicUsize,
}

impl EscalationShared {
    fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::SeqCst);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::SeqCst))
    }
}

/// Decrements the live-loop count when the escalation thread exits, unwinding included.
struct LiveLoopGuard(Arc<EscalationShared>);

impl Drop for LiveLoopGuard {
    fn drop(&mut self) {
        self.0.live_loops.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to a running escalation loop.
struct EscalationTask {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl EscalationTask {
    fn spawn(
        sink: Arc<dyn AlertSink>,
        settings: EscalationSettings,
        shared: Arc<EscalationShared>,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        shared.live_loops.fetch_add(1, Ordering::SeqCst);
        let task_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("siren-escalation".to_string())
            .spawn(move || {
                let _live = LiveLoopGuard(Arc::clone(&task_shared));
                escalation_loop(sink.as_ref(), &settings, &task_shared, &stop_rx);
            });
        match spawned {
            Ok(handle) => Ok(Self { stop_tx, handle }),
            Err(e) => {
                shared.live_loops.fetch_sub(1, Ordering::SeqCst);
                Err(anyhow!("failed to spawn escalation task: {}", e))
            }
        }
    }

    /// Signal the loop and wait for it to exit.
    fn cancel(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            log::error!("alarm: escalation task panicked");
        }
    }
}

fn escalation_loop(
    sink: &dyn AlertSink,
    settings: &EscalationSettings,
    shared: &EscalationShared,
    stop_rx: &mpsc::Receiver<()>,
) {
    let mut cycles = 0u64;
    let mut play_failed = false;
    loop {
        let volume = settings.volume_after(cycles);
        if let Err(e) = sink.play(volume) {
            if !play_failed {
                log::warn!("alarm: siren playback failed: {}", e);
                play_failed = true;
            }
        }
        cycles += 1;
        shared.cycles.store(cycles, Ordering::SeqCst);
        shared.set_volume(settings.volume_after(cycles));
        log::debug!("alarm: cycle {} volume {:.2}", cycles, shared.volume());

        match stop_rx.recv_timeout(settings.interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Owner of the alarm state and its escalation task.
pub struct AlarmController {
    sink: Option<Arc<dyn AlertSink>>,
    settings: EscalationSettings,
    state: AlarmState,
    shared: Arc<EscalationShared>,
    task: Option<EscalationTask>,
    activations: u64,
}

impl AlarmController {
    pub fn new(sink: Arc<dyn AlertSink>, settings: EscalationSettings) -> Self {
        Self::build(Some(sink), settings)
    }

    /// Controller whose `start()`/`stop()` never do anything.
    pub fn disabled(settings: EscalationSettings) -> Self {
        Self::build(None, settings)
    }

    /// Load the siren clip and open a sink for it.
    ///
    /// Any failure is reported once as a warning and yields a disabled
    /// controller, so the rest of the pipeline keeps running.
    pub fn from_asset<F>(path: &Path, settings: EscalationSettings, open_sink: F) -> Self
    where
        F: FnOnce(&AlertSound) -> Result<Arc<dyn AlertSink>>,
    {
        match AlertSound::load(path).and_then(|sound| open_sink(&sound)) {
            Ok(sink) => {
                log::info!("alarm: siren loaded from {}", path.display());
                Self::new(sink, settings)
            }
            Err(e) => {
                log::warn!("alarm disabled: {:#}", e);
                Self::disabled(settings)
            }
        }
    }

    fn build(sink: Option<Arc<dyn AlertSink>>, settings: EscalationSettings) -> Self {
        let shared = Arc::new(EscalationShared::default());
        shared.set_volume(settings.min_volume);
        Self {
            sink,
            settings,
            state: AlarmState::Idle,
            shared,
            task: None,
            activations: 0,
        }
    }

    /// Idle → Sounding. Returns true only when the transition happened.
    pub fn start(&mut self) -> bool {
        let Some(sink) = self.sink.as_ref() else {
            return false;
        };
        if self.state == AlarmState::Sounding || self.task.is_some() {
            return false;
        }

        self.shared.set_volume(self.settings.min_volume);
        self.shared.cycles.store(0, Ordering::SeqCst);
        match EscalationTask::spawn(
            Arc::clone(sink),
            self.settings.clone(),
            Arc::clone(&self.shared),
        ) {
            Ok(task) => {
                self.task = Some(task);
                self.state = AlarmState::Sounding;
                self.activations += 1;
                log::info!("alarm: sounding");
                true
            }
            Err(e) => {
                log::error!("alarm: {:#}", e);
                false
            }
        }
    }

    /// Sounding → Idle. Blocks until the escalation task has exited.
    /// Returns true only when the transition happened.
    pub fn stop(&mut self) -> bool {
        if self.state == AlarmState::Idle {
            return false;
        }
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        if let Some(sink) = &self.sink {
            sink.silence();
        }
        self.state = AlarmState::Idle;
        log::info!("alarm: idle");
        true
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_sounding(&self) -> bool {
        self.state == AlarmState::Sounding
    }

    /// False when the siren asset could not be loaded.
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn settings(&self) -> &EscalationSettings {
        &self.settings
    }

    /// Current escalation volume.
    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    /// Playbacks completed since the last `start()`.
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::SeqCst)
    }

    /// Number of Idle → Sounding transitions so far.
    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Escalation loops currently alive.
    pub fn running_loops(&self) -> usize {
        self.shared.live_loops.load(Ordering::SeqCst)
    }
}

impl Drop for AlarmController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct CountingSink {
        plays: Mutex<Vec<f32>>,
        silenced: AtomicUsize,
    }

    impl AlertSink for CountingSink {
        fn play(&self, volume: f32) -> Result<()> {
            self.plays.lock().unwrap().push(volume);
            Ok(())
        }

        fn silence(&self) {
            self.silenced.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_settings() -> EscalationSettings {
        EscalationSettings {
            interval: Duration::from_millis(5),
            ..EscalationSettings::default()
        }
    }

    fn wait_for_cycles(alarm: &AlarmController, n: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while alarm.cycles() < n {
            assert!(Instant::now() < deadline, "escalation did not reach {} cycles", n);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn volume_ramp_matches_closed_form() {
        let settings = EscalationSettings::default();
        assert_eq!(settings.volume_after(0), 0.2);
        assert_eq!(settings.volume_after(4), (0.2f32 + 4.0 * 0.05).min(1.0));
        assert_eq!(settings.volume_after(20), 1.0);
        assert_eq!(settings.volume_after(1_000), 1.0);
    }

    #[test]
    fn start_twice_runs_one_loop() {
        let sink = Arc::new(CountingSink::default());
        let mut alarm = AlarmController::new(sink.clone(), fast_settings());

        assert!(alarm.start());
        assert!(!alarm.start());
        assert_eq!(alarm.running_loops(), 1);
        assert_eq!(alarm.activations(), 1);
        assert!(alarm.is_sounding());

        assert!(alarm.stop());
        assert_eq!(alarm.running_loops(), 0);
        assert_eq!(sink.silenced.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_while_idle_is_a_noop() {
        let sink = Arc::new(CountingSink::default());
        let mut alarm = AlarmController::new(sink.clone(), fast_settings());
        assert!(!alarm.stop());
        assert!(!alarm.stop());
        assert_eq!(alarm.state(), AlarmState::Idle);
        assert_eq!(sink.silenced.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn escalation_plays_with_rising_volume_until_stopped() {
        let sink = Arc::new(CountingSink::default());
        let settings = fast_settings();
        let mut alarm = AlarmController::new(sink.clone(), settings.clone());

        alarm.start();
        wait_for_cycles(&alarm, 3);
        alarm.stop();

        let cycles = alarm.cycles();
        assert_eq!(alarm.volume(), settings.volume_after(cycles));
        let plays = sink.plays.lock().unwrap().clone();
        assert_eq!(plays.len() as u64, cycles);
        for (k, volume) in plays.iter().enumerate() {
            assert_eq!(*volume, settings.volume_after(k as u64));
        }

        let before = plays.len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(sink.plays.lock().unwrap().len(), before);
    }

    #[test]
    fn restart_resets_volume_to_floor() {
        let sink = Arc::new(CountingSink::default());
        let mut alarm = AlarmController::new(sink.clone(), fast_settings());
        alarm.start();
        wait_for_cycles(&alarm, 2);
        alarm.stop();
        sink.plays.lock().unwrap().clear();

        alarm.start();
        wait_for_cycles(&alarm, 1);
        alarm.stop();
        assert_eq!(sink.plays.lock().unwrap()[0], 0.2);
        assert_eq!(alarm.activations(), 2);
    }

    struct PanickingSink;

    impl AlertSink for PanickingSink {
        fn play(&self, _volume: f32) -> Result<()> {
            panic!("audio backend crashed");
        }

        fn silence(&self) {}
    }

    #[test]
    fn panicking_sink_does_not_leak_live_loop() {
        let mut alarm = AlarmController::new(Arc::new(PanickingSink), fast_settings());
        assert!(alarm.start());
        let deadline = Instant::now() + Duration::from_secs(5);
        while alarm.running_loops() != 0 {
            assert!(Instant::now() < deadline, "escalation loop count never dropped");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(alarm.stop());
        assert_eq!(alarm.running_loops(), 0);
        assert_eq!(alarm.state(), AlarmState::Idle);
    }

    #[test]
    fn stop_returns_within_one_interval() {
        let sink = Arc::new(CountingSink::default());
        let mut alarm = AlarmController::new(
            sink,
            EscalationSettings {
                interval: Duration::from_secs(30),
                ..EscalationSettings::default()
            },
        );
        alarm.start();
        wait_for_cycles(&alarm, 1);
        let started = Instant::now();
        alarm.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_asset_disables_controller() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut alarm = AlarmController::from_asset(
            &dir.path().join("siren.wav"),
            fast_settings(),
            |_| Ok(Arc::new(CountingSink::default()) as Arc<dyn AlertSink>),
        );
        assert!(!alarm.is_enabled());
        assert!(!alarm.start());
        assert!(!alarm.is_sounding());
        assert!(!alarm.stop());
        assert_eq!(alarm.running_loops(), 0);
        Ok(())
    }

    #[test]
    fn settings_validation() {
        assert!(EscalationSettings::default().validate().is_ok());
        let bad = EscalationSettings {
            min_volume: 0.9,
            max_volume: 0.5,
            ..EscalationSettings::default()
        };
        assert!(bad.validate().is_err());
        let bad = EscalationSettings {
            interval: Duration::ZERO,
            ..EscalationSettings::default()
        };
        assert!(bad.validate().is_err());
    }
}
