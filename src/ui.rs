use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Resolution of the elapsed/threshold alert bar.
const ALERT_BAR_STEPS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    pub fn plain() -> Self {
        Self::new(UiMode::Plain, false, true)
    }

    pub fn is_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.is_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live per-frame view: a frame counter plus an alert bar.
    pub fn live_view(&self) -> LiveView {
        if !self.is_pretty() {
            return LiveView {
                bars: None,
                alert_label: None,
            };
        }
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let frames = multi.add(ProgressBar::new_spinner());
        frames.set_style(
            ProgressStyle::with_template("{spinner} frame {pos} ({per_sec}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        let alert = multi.add(ProgressBar::new(ALERT_BAR_STEPS));
        alert.set_style(
            ProgressStyle::with_template("{prefix:.red.bold} [{bar:30.red/white}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        LiveView {
            bars: Some(LiveBars {
                _multi: multi,
                frames,
                alert,
            }),
            alert_label: None,
        }
    }
}

struct LiveBars {
    _multi: MultiProgress,
    frames: ProgressBar,
    alert: ProgressBar,
}

/// Frame counter, alert banner and elapsed/threshold progress.
///
/// In plain mode banner transitions are written as single stderr lines.
pub struct LiveView {
    bars: Option<LiveBars>,
    alert_label: Option<String>,
}

impl LiveView {
    pub fn tick_frame(&self, number: u64) {
        if let Some(bars) = &self.bars {
            bars.frames.set_position(number);
        }
    }

    /// Show the banner for `label` with `progress` in 0.0..=1.0.
    pub fn show_alert(&mut self, label: &str, progress: f64, text: &str) {
        let changed = self.alert_label.as_deref() != Some(label);
        match &self.bars {
            Some(bars) => {
                if changed {
                    bars.alert.set_prefix(format!("ALERT: {label} detected!"));
                }
                bars.alert
                    .set_position((progress.clamp(0.0, 1.0) * ALERT_BAR_STEPS as f64) as u64);
                bars.alert.set_message(text.to_string());
            }
            None => {
                if changed {
                    eprintln!("ALERT: {label} detected! ({text})");
                }
            }
        }
        if changed {
            self.alert_label = Some(label.to_string());
        }
    }

    pub fn clear_alert(&mut self) {
        if self.alert_label.take().is_none() {
            return;
        }
        match &self.bars {
            Some(bars) => {
                bars.alert.set_prefix(String::new());
                bars.alert.set_position(0);
                bars.alert.set_message(String::new());
            }
            None => eprintln!("alert cleared"),
        }
    }

    pub fn alert_label(&self) -> Option<&str> {
        self.alert_label.as_deref()
    }

    pub fn finish(&mut self) {
        self.alert_label = None;
        if let Some(bars) = self.bars.take() {
            bars.alert.finish_and_clear();
            bars.frames.finish_with_message("done");
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_requires_a_tty() {
        assert!(!Ui::from_args(Some("pretty"), false, false).is_pretty());
        assert!(Ui::from_args(Some("pretty"), true, true).is_pretty());
        assert!(!Ui::from_args(Some("auto"), true, true).is_pretty());
        assert!(!Ui::from_args(Some("plain"), true, false).is_pretty());
    }

    #[test]
    fn plain_live_view_tracks_banner_transitions() {
        let mut view = Ui::plain().live_view();
        view.show_alert("Texting", 0.5, "4.0s / 8.0s");
        assert_eq!(view.alert_label(), Some("Texting"));
        view.show_alert("Texting", 0.6, "4.8s / 8.0s");
        view.clear_alert();
        assert_eq!(view.alert_label(), None);
        view.finish();
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
