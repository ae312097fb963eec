use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tessera_worker::{ProgressEvent, ProgressSink};

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress sink using indicatif.
///
/// - indeterminate steps: spinner
/// - counted steps: percentage bar
///
/// A new bar starts whenever the step label changes.
pub struct BarSink {
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl BarSink {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn start_bar(event: &ProgressEvent) -> ProgressBar {
        let pb = if event.indeterminate {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars(TICK_CHARS),
            );
            pb
        } else {
            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {msg} [{bar:30.cyan/dim}] {pos}%")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("━╸─")
                    .tick_chars(TICK_CHARS),
            );
            pb
        };
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&self, event: &ProgressEvent) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let same_step = matches!(guard.as_ref(), Some((label, _)) if *label == event.label);
        if !same_step {
            if let Some((_, old)) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some((event.label.clone(), Self::start_bar(event)));
        }

        if let Some((_, pb)) = guard.as_ref() {
            if event.is_cancellable {
                pb.set_message(format!("{} (Ctrl-C to cancel)", event.label));
            } else {
                pb.set_message(event.label.clone());
            }
            if !event.indeterminate {
                pb.set_position(u64::from(event.percent_complete));
            }
        }
    }

    fn on_finish(&self, _message: &str) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, pb)) = guard.take() {
            pb.finish_and_clear();
        }
    }
}
