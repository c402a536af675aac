//! Event types emitted by the measurement worker.

use crate::errors::{ErrorKind, NetSpeedError};
use crate::provider::ServerInfo;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Stages of a single run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Connecting to the provider
    Initializing,
    /// Picking the server to measure against
    FindingServer,
    /// Running the download transfers
    Download,
    /// Running the upload transfers
    Upload,
    /// All measurements done
    Complete,
}

impl Stage {
    /// Completion percentage announced when the stage starts.
    pub fn percent(&self) -> u16 {
        match self {
            Stage::Initializing => 10,
            Stage::FindingServer => 20,
            Stage::Download => 50,
            Stage::Upload => 70,
            Stage::Complete => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing test...",
            Stage::FindingServer => "Finding best server...",
            Stage::Download => "Testing download...",
            Stage::Upload => "Testing upload...",
            Stage::Complete => "Test complete!",
        }
    }
}

/// Figures delivered by a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    /// Download throughput in Mbps, 2 decimals
    pub download_mbps: f64,
    /// Upload throughput in Mbps, 2 decimals
    pub upload_mbps: f64,
    /// Latency in ms, 2 decimals
    pub ping_ms: f64,
    /// Local completion time, second precision
    pub timestamp: NaiveDateTime,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub suggestion: Option<String>,
}

impl From<NetSpeedError> for RunFailure {
    fn from(error: NetSpeedError) -> Self {
        Self { kind: error.kind, message: error.message, suggestion: error.suggestion }
    }
}

impl From<RunFailure> for NetSpeedError {
    fn from(failure: RunFailure) -> Self {
        let error = NetSpeedError::new(failure.kind, failure.message);

        match failure.suggestion {
            Some(suggestion) => error.with_suggestion(suggestion),
            None => error,
        }
    }
}

/// Everything the worker reports, in emission order.
///
/// A run emits progress and at most one server event, then at most one
/// terminal event ([`Completed`](RunEvent::Completed) or
/// [`Failed`](RunEvent::Failed)). A cancelled run emits no terminal event.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A new stage has started
    Progress(Stage),
    /// The server to measure against has been chosen
    ServerSelected(ServerInfo),
    /// The run finished with a result
    Completed(RunResult),
    /// The run failed
    Failed(RunFailure),
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Completed(_) | RunEvent::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            Stage::Initializing,
            Stage::FindingServer,
            Stage::Download,
            Stage::Upload,
            Stage::Complete,
        ];

        let percents: Vec<u16> = stages.iter().map(Stage::percent).collect();
        assert_eq!(percents, [10, 20, 50, 70, 100]);
        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::FindingServer.label(), "Finding best server...");
        assert_eq!(Stage::Complete.label(), "Test complete!");
    }

    #[test]
    fn test_failure_round_trips_through_error() {
        let failure = RunFailure::from(NetSpeedError::invalid_server_response(
            "server descriptor has no identifier",
        ));

        let error = NetSpeedError::from(failure.clone());

        assert_eq!(error.kind, ErrorKind::InvalidServerResponse);
        assert_eq!(error.message, failure.message);
        assert_eq!(error.suggestion, failure.suggestion);
    }

    #[test]
    fn test_only_results_and_failures_are_terminal() {
        assert!(!RunEvent::Progress(Stage::Upload).is_terminal());
        assert!(RunEvent::Failed(RunFailure {
            kind: ErrorKind::Provider,
            message: "boom".to_string(),
            suggestion: None,
        })
        .is_terminal());
    }
}
