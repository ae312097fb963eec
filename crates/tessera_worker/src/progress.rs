//! Throttled progress reporting with cooperative cancellation.
//!
//! Operations hold a [`ProgressReporter`]. They ask
//! [`ready_to_report`](ProgressReporter::ready_to_report) before emitting so
//! a slow consumer is not flooded, and every emitted event is followed by a
//! short fixed backoff. Consumers implement [`ProgressSink`].

use crate::cancel::CancellationToken;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(5);

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// 0..=100
    pub percent_complete: u8,
    pub label: String,
    pub is_cancellable: bool,
    /// The operation cannot estimate its progress yet.
    pub indeterminate: bool,
}

impl ProgressEvent {
    /// `completed * 100 / total`, truncated. An empty job is complete.
    pub fn percent(completed: u64, total: u64) -> u8 {
        if total == 0 {
            return 100;
        }
        (completed.min(total).saturating_mul(100) / total) as u8
    }

    pub fn units(label: impl Into<String>, completed: u64, total: u64) -> Self {
        Self {
            percent_complete: Self::percent(completed, total),
            label: label.into(),
            is_cancellable: true,
            indeterminate: false,
        }
    }

    pub fn indeterminate(label: impl Into<String>) -> Self {
        Self {
            percent_complete: 0,
            label: label.into(),
            is_cancellable: true,
            indeterminate: true,
        }
    }

    pub fn with_cancellable(mut self, is_cancellable: bool) -> Self {
        self.is_cancellable = is_cancellable;
        self
    }
}

/// Receives progress events.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);

    /// The operation returned; `message` is its closing summary.
    fn on_finish(&self, _message: &str) {}
}

/// Discards everything.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
    finished: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn finish_message(&self) -> Option<String> {
        self.finished
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }

    fn on_finish(&self, message: &str) {
        *self.finished.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }
}

/// Rate limits for a reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    /// Minimum time between two emitted events
    pub refresh_interval: Duration,
    /// Pause after each emitted event
    pub backoff: Duration,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl ProgressSettings {
    /// Emit every event without pausing.
    pub fn unthrottled() -> Self {
        Self {
            refresh_interval: Duration::ZERO,
            backoff: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct ReporterState {
    last_emit: Option<Instant>,
    last_percent: u8,
}

/// Progress and cancellation channel for one operation.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    token: CancellationToken,
    settings: ProgressSettings,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            token: CancellationToken::new(),
            settings: ProgressSettings::default(),
            state: Mutex::new(ReporterState::default()),
        }
    }

    /// A reporter that discards events. Cancellation still works.
    pub fn silent() -> Self {
        Self::new(Arc::new(SilentSink))
    }

    pub fn with_settings(mut self, settings: ProgressSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing token instead of a fresh one.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        if self.token.cancel() {
            tracing::info!("Cancellation requested");
        }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether enough time has passed since the last emitted event.
    pub fn ready_to_report(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.last_emit {
            None => true,
            Some(at) => at.elapsed() >= self.settings.refresh_interval,
        }
    }

    /// Emit `event`, then pause for the backoff.
    ///
    /// The percentage never goes backwards within one reporter.
    pub async fn report(&self, mut event: ProgressEvent) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            event.percent_complete = event.percent_complete.clamp(state.last_percent, 100);
            state.last_percent = event.percent_complete;
            state.last_emit = Some(Instant::now());
        }
        self.sink.on_progress(&event);

        if !self.settings.backoff.is_zero() {
            tokio::time::sleep(self.settings.backoff).await;
        }
    }

    /// Report `completed` of `total` units if the throttle allows it.
    ///
    /// The last unit is always reported.
    pub async fn report_units(&self, label: &str, completed: u64, total: u64) {
        if completed >= total || self.ready_to_report() {
            self.report(ProgressEvent::units(label, completed, total))
                .await;
        }
    }

    /// Hand the closing summary to the sink.
    pub fn finish(&self, message: &str) {
        self.sink.on_finish(message);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("settings", &self.settings)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
