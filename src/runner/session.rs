//! Run session state machine.
//!
//! The session owns the handle of the current run and is the only place
//! that decides whether a new run may start.

use super::events::{RunEvent, RunFailure};
use super::RunHandle;
use crate::errors::{ErrorKind, NetSpeedError};
use log::{debug, warn};
use std::thread::JoinHandle;
use tokio::sync::mpsc::error::TryRecvError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run in progress
    Idle,
    /// A run is in progress
    Running,
    /// A stop was requested; the worker exits at its next checkpoint
    Stopping,
}

/// What the session reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// An event from the worker, in emission order
    Event(RunEvent),
    /// The run ended without a result or a failure. The provider may
    /// still have completed a transfer that was never reported.
    Aborted,
}

pub struct RunSession {
    state: RunState,
    current: Option<RunHandle>,
    detached: Option<JoinHandle<()>>,
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSession {
    pub fn new() -> Self {
        Self { state: RunState::Idle, current: None, detached: None }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RunState::Idle
    }

    /// Start a run with `spawn`, which is only called when no other worker
    /// is alive.
    pub fn start<F>(&mut self, spawn: F) -> Result<(), NetSpeedError>
    where
        F: FnOnce() -> Result<RunHandle, NetSpeedError>,
    {
        if self.state != RunState::Idle {
            return Err(NetSpeedError::config("a speed test is already running"));
        }

        if let Some(ref worker) = self.detached {
            if !worker.is_finished() {
                return Err(NetSpeedError::config(
                    "the previous speed test is still shutting down",
                )
                .with_suggestion("Wait a few seconds and try again."));
            }
            self.detached = None;
        }

        self.current = Some(spawn()?);
        self.state = RunState::Running;
        debug!("Run started");

        Ok(())
    }

    /// Ask the current run to stop at its next checkpoint. Returns whether
    /// a stop was requested.
    pub fn request_stop(&mut self) -> bool {
        match (self.state, &self.current) {
            (RunState::Running, Some(handle)) => {
                handle.cancel();
                self.state = RunState::Stopping;
                debug!("Stop requested");
                true
            }
            _ => false,
        }
    }

    /// Stop listening to the current run right away.
    ///
    /// The worker is left to finish its in-flight call in the background.
    /// Returns `None` when nothing was running.
    pub fn force_stop(&mut self) -> Option<SessionUpdate> {
        let handle = self.current.take()?;

        warn!("Abandoning the running speed test");
        self.detached = Some(handle.detach());
        self.state = RunState::Idle;

        Some(SessionUpdate::Aborted)
    }

    /// Next update without blocking. `None` when nothing is pending.
    pub fn poll(&mut self) -> Option<SessionUpdate> {
        let handle = self.current.as_mut()?;

        match handle.try_next() {
            Ok(event) => Some(self.deliver(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.disconnected()),
        }
    }

    /// Next update, blocking until one arrives. `None` when nothing is
    /// running.
    pub fn wait(&mut self) -> Option<SessionUpdate> {
        let handle = self.current.as_mut()?;

        match handle.next_blocking() {
            Some(event) => Some(self.deliver(event)),
            None => Some(self.disconnected()),
        }
    }

    fn deliver(&mut self, event: RunEvent) -> SessionUpdate {
        if event.is_terminal() {
            self.finish();
        }

        SessionUpdate::Event(event)
    }

    fn finish(&mut self) {
        if let Some(handle) = self.current.take() {
            // The worker returns right after its terminal event
            let _ = handle.join();
        }
        self.state = RunState::Idle;
    }

    /// The worker exited without a terminal event: either it stopped at a
    /// checkpoint or it panicked.
    fn disconnected(&mut self) -> SessionUpdate {
        let joined = self.current.take().map(RunHandle::join);
        self.state = RunState::Idle;

        match joined {
            Some(Err(_)) => SessionUpdate::Event(RunEvent::Failed(RunFailure {
                kind: ErrorKind::Provider,
                message: "the measurement worker crashed".to_string(),
                suggestion: None,
            })),
            _ => {
                debug!("Run stopped before completing");
                SessionUpdate::Aborted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::events::Stage;
    use crate::runner::testing::{start_scripted, Scripted};
    use crate::runner::{start, RunRequest};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn spawn(scripted: Scripted) -> impl FnOnce() -> Result<RunHandle, NetSpeedError> {
        move || Ok(start_scripted(scripted, RunRequest::default()))
    }

    fn wait_all(session: &mut RunSession) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = session.wait() {
            updates.push(update);
        }
        updates
    }

    fn wait_for(session: &mut RunSession, stage: Stage) {
        loop {
            match session.wait() {
                Some(SessionUpdate::Event(RunEvent::Progress(s))) if s == stage => return,
                Some(_) => continue,
                None => panic!("run ended before {:?}", stage),
            }
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let mut session = RunSession::new();
        assert_eq!(session.state(), RunState::Idle);
        assert!(!session.request_stop());
        assert_eq!(session.force_stop(), None);
        assert_eq!(session.poll(), None);
        assert_eq!(session.wait(), None);
    }

    #[test]
    fn test_successful_run_returns_to_idle() {
        let mut session = RunSession::new();
        session.start(spawn(Scripted::default())).unwrap();
        assert_eq!(session.state(), RunState::Running);

        let updates = wait_all(&mut session);

        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Event(RunEvent::Completed(_)))
        ));
        assert_eq!(session.state(), RunState::Idle);
    }

    #[test]
    fn test_failed_run_can_be_retried() {
        let mut session = RunSession::new();
        let failing = Scripted { download: Err("timed out"), ..Scripted::default() };
        session.start(spawn(failing)).unwrap();

        let updates = wait_all(&mut session);
        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Event(RunEvent::Failed(_)))
        ));
        assert!(session.is_idle());

        session.start(spawn(Scripted::default())).unwrap();
        assert_eq!(session.state(), RunState::Running);
        wait_all(&mut session);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let (release, gate) = mpsc::channel();
        let mut session = RunSession::new();
        session
            .start(spawn(Scripted { gate_download: Some(gate), ..Scripted::default() }))
            .unwrap();

        let mut spawned = false;
        let error = session
            .start(|| {
                spawned = true;
                Ok(start_scripted(Scripted::default(), RunRequest::default()))
            })
            .unwrap_err();

        assert_eq!(error.kind, ErrorKind::Config);
        assert!(!spawned);

        drop(release);
        wait_all(&mut session);
    }

    #[test]
    fn test_requested_stop_ends_aborted() {
        let (release, gate) = mpsc::channel();
        let mut session = RunSession::new();
        session
            .start(spawn(Scripted { gate_download: Some(gate), ..Scripted::default() }))
            .unwrap();

        wait_for(&mut session, Stage::Download);
        assert!(session.request_stop());
        assert_eq!(session.state(), RunState::Stopping);
        assert!(!session.request_stop());

        release.send(()).unwrap();

        assert_eq!(wait_all(&mut session), [SessionUpdate::Aborted]);
        assert!(session.is_idle());
    }

    #[test]
    fn test_result_arriving_while_stopping_is_delivered() {
        let (release, gate) = mpsc::channel();
        let mut session = RunSession::new();
        session
            .start(spawn(Scripted { gate_upload: Some(gate), ..Scripted::default() }))
            .unwrap();

        // Past the last checkpoint, the stop can no longer take effect
        wait_for(&mut session, Stage::Upload);
        session.request_stop();
        release.send(()).unwrap();

        let updates = wait_all(&mut session);
        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Event(RunEvent::Completed(_)))
        ));
        assert!(session.is_idle());
    }

    #[test]
    fn test_force_stop_blocks_restart_until_worker_exits() {
        let (release, gate) = mpsc::channel();
        let mut session = RunSession::new();
        session
            .start(spawn(Scripted { gate_download: Some(gate), ..Scripted::default() }))
            .unwrap();
        wait_for(&mut session, Stage::Download);

        assert_eq!(session.force_stop(), Some(SessionUpdate::Aborted));
        assert!(session.is_idle());
        assert_eq!(session.poll(), None);

        let error = session.start(spawn(Scripted::default())).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Config);

        release.send(()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.start(spawn(Scripted::default())).is_err() {
            assert!(Instant::now() < deadline, "detached worker never exited");
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(matches!(
            wait_all(&mut session).last(),
            Some(SessionUpdate::Event(RunEvent::Completed(_)))
        ));
    }

    #[test]
    fn test_poll_reports_updates_in_order() {
        let mut session = RunSession::new();
        session.start(spawn(Scripted::default())).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut updates = Vec::new();
        while !session.is_idle() {
            assert!(Instant::now() < deadline, "run never finished");
            match session.poll() {
                Some(update) => updates.push(update),
                None => std::thread::sleep(Duration::from_millis(1)),
            }
        }

        assert_eq!(
            updates.first(),
            Some(&SessionUpdate::Event(RunEvent::Progress(Stage::Initializing)))
        );
        let terminal = updates
            .iter()
            .filter(|u| matches!(u, SessionUpdate::Event(e) if e.is_terminal()))
            .count();
        assert_eq!(terminal, 1);
    }

    #[test]
    fn test_panicking_worker_is_a_failure() {
        let mut session = RunSession::new();
        session
            .start(|| {
                start(
                    |_| -> Result<Scripted, crate::errors::BoxError> {
                        panic!("provider bug")
                    },
                    RunRequest::default(),
                )
            })
            .unwrap();

        let updates = wait_all(&mut session);

        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Event(RunEvent::Failed(_)))
        ));
        assert!(session.is_idle());
    }
}
