//! TUI state management.
//!
//! Holds everything the renderer needs: the progress of the current run
//! and a snapshot of the history it draws the chart from.

use crate::errors::NetSpeedError;
use crate::history::{Aggregates, HistoryStorage, HistoryStore, Measurement};
use crate::provider::ServerInfo;
use crate::runner::{RunEvent, RunResult, SessionUpdate, Stage};

/// Error information for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// Error message
    pub message: String,
    /// Optional suggestion for resolution
    pub suggestion: Option<String>,
}

impl From<&NetSpeedError> for ErrorInfo {
    fn from(error: &NetSpeedError) -> Self {
        Self { message: error.message.clone(), suggestion: error.suggestion.clone() }
    }
}

/// How the last run ended, if it has.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(RunResult),
    Failed(ErrorInfo),
    Aborted,
}

/// Progress of the current (or last) run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunView {
    /// Last stage announced by the worker
    pub stage: Option<Stage>,
    /// Gauge position; never moves backwards within a run
    pub percent: u16,
    /// Server announced for this run
    pub server: Option<ServerInfo>,
    /// Set once the run has ended
    pub outcome: Option<Outcome>,
    /// A stop was requested and the worker has not exited yet
    pub stopping: bool,
}

impl RunView {
    /// Apply one update from the session.
    pub fn apply(&mut self, update: &SessionUpdate) {
        match update {
            SessionUpdate::Event(RunEvent::Progress(stage)) => {
                self.stage = Some(*stage);
                self.percent = self.percent.max(stage.percent());
            }
            SessionUpdate::Event(RunEvent::ServerSelected(server)) => {
                self.server = Some(server.clone());
            }
            SessionUpdate::Event(RunEvent::Completed(result)) => {
                self.outcome = Some(Outcome::Completed(result.clone()));
                self.stopping = false;
            }
            SessionUpdate::Event(RunEvent::Failed(failure)) => {
                self.outcome = Some(Outcome::Failed(ErrorInfo {
                    message: failure.message.clone(),
                    suggestion: failure.suggestion.clone(),
                }));
                self.stopping = false;
            }
            SessionUpdate::Aborted => {
                self.outcome = Some(Outcome::Aborted);
                self.stopping = false;
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Text shown next to the gauge.
    pub fn status_label(&self) -> &'static str {
        match (&self.outcome, self.stopping, self.stage) {
            (Some(Outcome::Aborted), _, _) => "Test stopped",
            (Some(Outcome::Failed(_)), _, _) => "Test failed",
            (Some(Outcome::Completed(_)), _, _) => Stage::Complete.label(),
            (None, true, _) => "Stopping...",
            (None, false, Some(stage)) => stage.label(),
            (None, false, None) => "Ready",
        }
    }
}

/// Snapshot of the history store taken after each change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    /// Oldest first
    pub measurements: Vec<Measurement>,
    pub aggregates: Option<Aggregates>,
    pub capacity: usize,
}

impl HistoryView {
    pub fn from_store<S: HistoryStorage>(store: &HistoryStore<S>) -> Self {
        Self {
            measurements: store.measurements().to_vec(),
            aggregates: store.aggregates(),
            capacity: store.capacity(),
        }
    }
}

/// Which screen is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// Progress, results, averages and chart
    #[default]
    Run,
    /// Chart and averages only
    Chart,
}

/// State for the TUI display.
#[derive(Debug, Clone, PartialEq)]
pub struct TuiState {
    pub screen: Screen,
    pub run: RunView,
    pub history: HistoryView,
    /// One-line message for the status bar, e.g. a failed save
    pub notice: Option<String>,
    /// Terminal width for layout
    pub terminal_width: u16,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            screen: Screen::Run,
            run: RunView::default(),
            history: HistoryView::default(),
            notice: None,
            terminal_width: 80,
        }
    }
}

impl TuiState {
    pub fn new(screen: Screen) -> Self {
        Self { screen, ..Self::default() }
    }

    /// Forget the previous run before starting another one.
    pub fn reset_run(&mut self) {
        self.run = RunView::default();
        self.notice = None;
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }
}
