//! Measurement runner.
//!
//! A run happens on one worker thread that owns the provider. The worker
//! reports through a [`RunEvent`] stream and stops at the next checkpoint
//! once its [`CancellationToken`] is set. A provider call that is already
//! in flight is never interrupted.

pub mod events;
pub mod session;

pub use events::{RunEvent, RunFailure, RunResult, Stage};
pub use session::{RunSession, RunState, SessionUpdate};

use crate::errors::{BoxError, ErrorKind, NetSpeedError};
use crate::measurements::bps_to_mbps;
use crate::provider::Provider;
use crate::stats::round2;
use chrono::{Local, SubsecRound};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{
    error::TryRecvError, unbounded_channel, UnboundedReceiver, UnboundedSender,
};

/// Timeout handed to the provider when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Server to measure against; the provider picks when unset
    pub server_id: Option<String>,
    /// Timeout applied to every provider request
    pub timeout: Duration,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self { server_id: None, timeout: DEFAULT_TIMEOUT }
    }
}

/// Cooperative stop flag shared between a handle and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The coordinating side of a running worker.
pub struct RunHandle {
    events: UnboundedReceiver<RunEvent>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl RunHandle {
    /// Ask the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next event without blocking.
    pub fn try_next(&mut self) -> Result<RunEvent, TryRecvError> {
        self.events.try_recv()
    }

    /// Next event, blocking until one arrives. `None` once the worker has
    /// exited and every event has been read.
    pub fn next_blocking(&mut self) -> Option<RunEvent> {
        self.events.blocking_recv()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker thread to exit. `Err` when it panicked.
    pub fn join(self) -> thread::Result<()> {
        self.worker.join()
    }

    /// Stop listening and hand back the thread, which keeps running until
    /// its current provider call returns.
    pub(crate) fn detach(self) -> JoinHandle<()> {
        self.cancel.cancel();
        self.worker
    }
}

/// Spawn a worker that builds a provider with `connect` and runs one full
/// measurement with it.
pub fn start<P, F>(connect: F, request: RunRequest) -> Result<RunHandle, NetSpeedError>
where
    P: Provider,
    F: FnOnce(Duration) -> Result<P, BoxError> + Send + 'static,
{
    let (sender, events) = unbounded_channel();
    let cancel = CancellationToken::default();
    let worker_cancel = cancel.clone();

    let worker = thread::Builder::new()
        .name("netspeed-run".to_string())
        .spawn(move || work(connect, request, sender, worker_cancel))
        .map_err(|e| {
            NetSpeedError::new(ErrorKind::Provider, "could not start the measurement worker")
                .with_source(e)
        })?;

    Ok(RunHandle { events, cancel, worker })
}

fn work<P, F>(
    connect: F,
    request: RunRequest,
    sender: UnboundedSender<RunEvent>,
    cancel: CancellationToken,
) where
    P: Provider,
    F: FnOnce(Duration) -> Result<P, BoxError>,
{
    // The listener may be gone; nothing to do about it from here
    let emit = |event: RunEvent| {
        let _ = sender.send(event);
    };

    match measure(connect, &request, &emit, &cancel) {
        Ok(Some(result)) => {
            info!(
                "Run complete: {} Mbps down, {} Mbps up, {} ms",
                result.download_mbps, result.upload_mbps, result.ping_ms
            );
            emit(RunEvent::Completed(result));
        }
        Ok(None) => debug!("Run cancelled"),
        Err(e) => {
            info!("Run failed: {}", e.message);
            emit(RunEvent::Failed(e.into()));
        }
    }
}

/// Drive the provider through every stage. `Ok(None)` when the run was
/// cancelled at a checkpoint.
fn measure<P, F>(
    connect: F,
    request: &RunRequest,
    emit: &dyn Fn(RunEvent),
    cancel: &CancellationToken,
) -> Result<Option<RunResult>, NetSpeedError>
where
    P: Provider,
    F: FnOnce(Duration) -> Result<P, BoxError>,
{
    emit(RunEvent::Progress(Stage::Initializing));
    let mut provider = connect(request.timeout).map_err(NetSpeedError::provider)?;

    emit(RunEvent::Progress(Stage::FindingServer));
    let server = provider
        .select_best_server(request.server_id.as_deref())
        .map_err(NetSpeedError::provider)?;
    server.validate()?;
    debug!("Selected server {} ({})", server.id, server.label());
    emit(RunEvent::ServerSelected(server));

    if cancel.is_cancelled() {
        return Ok(None);
    }

    emit(RunEvent::Progress(Stage::Download));
    let download = checked_rate("download", provider.measure_download())?;

    if cancel.is_cancelled() {
        return Ok(None);
    }

    emit(RunEvent::Progress(Stage::Upload));
    let upload = checked_rate("upload", provider.measure_upload())?;
    let ping = provider.last_ping();

    emit(RunEvent::Progress(Stage::Complete));

    Ok(Some(RunResult {
        download_mbps: round2(bps_to_mbps(download)),
        upload_mbps: round2(bps_to_mbps(upload)),
        ping_ms: round2(ping),
        timestamp: Local::now().naive_local().trunc_subsecs(0),
    }))
}

fn checked_rate(
    direction: &str,
    rate: Result<f64, BoxError>,
) -> Result<f64, NetSpeedError> {
    let bps = rate.map_err(NetSpeedError::provider)?;

    if !bps.is_finite() || bps < 0.0 {
        return Err(NetSpeedError::new(
            ErrorKind::Provider,
            format!("provider reported an invalid {} rate: {}", direction, bps),
        ));
    }

    Ok(bps)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::provider::testing::server;
    use crate::provider::{ServerCatalog, ServerInfo};
    use std::sync::mpsc::Receiver;

    /// Provider that replays fixed answers.
    ///
    /// A gate makes the matching call block until the test sends on, or
    /// drops, the other end.
    pub(crate) struct Scripted {
        pub(crate) server: Result<ServerInfo, &'static str>,
        pub(crate) download: Result<f64, &'static str>,
        pub(crate) upload: Result<f64, &'static str>,
        pub(crate) ping: f64,
        pub(crate) gate_select: Option<Receiver<()>>,
        pub(crate) gate_download: Option<Receiver<()>>,
        pub(crate) gate_upload: Option<Receiver<()>>,
    }

    impl Default for Scripted {
        fn default() -> Self {
            Self {
                server: Ok(server("CDG", "Paris", "FR")),
                download: Ok(123_456_789.0),
                upload: Ok(45_678_901.0),
                ping: 12.346,
                gate_select: None,
                gate_download: None,
                gate_upload: None,
            }
        }
    }

    impl Provider for Scripted {
        fn discover_servers(&mut self) -> Result<ServerCatalog, BoxError> {
            Ok(ServerCatalog::from_servers(self.server.clone()))
        }

        fn select_best_server(
            &mut self,
            server_id: Option<&str>,
        ) -> Result<ServerInfo, BoxError> {
            if let Some(ref gate) = self.gate_select {
                let _ = gate.recv();
            }

            let mut chosen = self.server.clone()?;
            if let Some(id) = server_id {
                chosen.id = id.to_string();
            }
            Ok(chosen)
        }

        fn measure_download(&mut self) -> Result<f64, BoxError> {
            if let Some(ref gate) = self.gate_download {
                let _ = gate.recv();
            }
            Ok(self.download?)
        }

        fn measure_upload(&mut self) -> Result<f64, BoxError> {
            if let Some(ref gate) = self.gate_upload {
                let _ = gate.recv();
            }
            Ok(self.upload?)
        }

        fn last_ping(&self) -> f64 {
            self.ping
        }
    }

    pub(crate) fn start_scripted(scripted: Scripted, request: RunRequest) -> RunHandle {
        start(move |_| Ok(scripted), request).unwrap()
    }

    /// Read events until `expected` shows up.
    pub(crate) fn wait_for(handle: &mut RunHandle, expected: RunEvent) {
        loop {
            match handle.next_blocking() {
                Some(event) if event == expected => return,
                Some(_) => continue,
                None => panic!("worker exited before {:?}", expected),
            }
        }
    }

    /// Every event of a run, until the worker exits.
    pub(crate) fn drain(mut handle: RunHandle) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next_blocking() {
            events.push(event);
        }
        handle.join().unwrap();
        events
    }
}
