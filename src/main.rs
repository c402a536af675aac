extern crate clap;

use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};
use log::{debug, info, warn};

use netspeed::config::{timeout_from_secs, Settings};
use netspeed::errors::{exit_codes, NetSpeedError};
use netspeed::history::{
    export_file_name, HistoryStorage, HistoryStore, JsonFileStorage,
    PendingMeasurement, DEFAULT_CAPACITY,
};
use netspeed::output::{self, BuildInfo, FailureReport, HistoryReport, RunReport};
use netspeed::provider::{CloudflareProvider, Provider, ServerInfo};
use netspeed::runner::{
    self, RunEvent, RunRequest, RunResult, RunSession, RunState, SessionUpdate,
    DEFAULT_TIMEOUT,
};
use netspeed::tui::{DisplayMode, HistoryView, KeyAction, Screen, TuiController};

/// How long the TUI waits for a key before checking on the worker again.
const TICK: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// History file to read and update
    #[arg(long, global = true, env = "NETSPEED_HISTORY_FILE", value_name = "PATH")]
    history_file: Option<PathBuf>,

    /// Number of results kept in the history
    #[arg(
        long,
        global = true,
        env = "NETSPEED_HISTORY_SIZE",
        default_value_t = DEFAULT_CAPACITY,
        value_name = "N"
    )]
    capacity: usize,

    /// Print JSON instead of the interactive screen
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<ErrorLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a speed test and record the result (default)
    Run(RunArgs),
    /// List the available test servers
    Servers,
    /// Show the recorded results, newest first
    History,
    /// Chart the recorded results
    Chart,
    /// Export the recorded results as semicolon-separated CSV
    Export {
        /// Output file; defaults to speedtest_<date>_<time>.csv
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show version and build information
    Info,
}

#[derive(Args)]
struct RunArgs {
    /// Server id to test against; the best server is picked by default
    #[arg(long, value_name = "ID")]
    server: Option<String>,

    /// Timeout for each request, in seconds (1-300)
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..=300)
    )]
    timeout: u64,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self { server: None, timeout: DEFAULT_TIMEOUT.as_secs() }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .parse_default_env()
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&e);
            e.exit_code()
        }
    };

    process::exit(code);
}

fn run(cli: Cli) -> Result<i32, NetSpeedError> {
    let settings = Settings::new(cli.history_file, cli.capacity);
    let mode = DisplayMode::for_stdout(cli.json);
    debug!("Display mode {:?}", mode);

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run_command(&settings, mode, args),
        Command::Servers => servers_command(mode),
        Command::History => history_command(&settings, mode),
        Command::Chart => chart_command(&settings, mode),
        Command::Export { output } => export_command(&settings, mode, output),
        Command::Info => info_command(&settings, mode),
    }
}

/// Open the history, keeping a load failure aside so each mode can
/// report it its own way.
fn open_history(
    settings: &Settings,
) -> Result<(HistoryStore<JsonFileStorage>, Option<NetSpeedError>), NetSpeedError> {
    let mut load_error = None;
    let store = settings.open_history(|e| load_error = Some(e))?;

    if let Some(ref e) = load_error {
        warn!("{}", e);
    }

    Ok((store, load_error))
}

fn start_run(session: &mut RunSession, request: &RunRequest) -> Result<(), NetSpeedError> {
    let request = request.clone();
    session.start(move || runner::start(CloudflareProvider::connect, request))
}

fn pending_from(result: &RunResult, server: Option<&ServerInfo>) -> PendingMeasurement {
    PendingMeasurement::new(
        result.download_mbps,
        result.upload_mbps,
        result.ping_ms,
        result.timestamp,
        server,
    )
}

fn run_command(
    settings: &Settings,
    mode: DisplayMode,
    args: RunArgs,
) -> Result<i32, NetSpeedError> {
    let request = RunRequest {
        server_id: args.server,
        timeout: timeout_from_secs(args.timeout)?,
    };
    let (mut store, load_error) = open_history(settings)?;

    if mode == DisplayMode::Tui {
        return run_interactive(store, load_error, &request);
    }

    if let Some(ref e) = load_error {
        if mode == DisplayMode::Silent {
            output::print_error(e);
        }
    }

    let mut session = RunSession::new();
    start_run(&mut session, &request)?;

    let mut server = None;
    while let Some(update) = session.wait() {
        match update {
            SessionUpdate::Event(RunEvent::Progress(stage)) => {
                info!("{}% {}", stage.percent(), stage.label());
            }
            SessionUpdate::Event(RunEvent::ServerSelected(selected)) => {
                if mode == DisplayMode::Silent {
                    output::print_server(&selected);
                }
                server = Some(selected);
            }
            SessionUpdate::Event(RunEvent::Completed(result)) => {
                let recorded = store.record(pending_from(&result, server.as_ref()));

                if mode == DisplayMode::Json {
                    output::print_json(&RunReport {
                        measurement: &recorded.measurement,
                        averages: store.aggregates(),
                        saved: recorded.persisted.is_ok(),
                        history_file: store.storage().location(),
                        history_warning: load_error.as_ref().map(|e| e.message.clone()),
                    })?;
                } else {
                    output::print_measurement(&recorded.measurement);
                    output::print_averages(store.aggregates());
                    if let Err(ref e) = recorded.persisted {
                        output::print_error(e);
                    }
                }

                return Ok(exit_codes::SUCCESS);
            }
            SessionUpdate::Event(RunEvent::Failed(failure)) => {
                let error = NetSpeedError::from(failure);
                if mode == DisplayMode::Json {
                    output::print_json(&FailureReport::from_error(&error))?;
                } else {
                    output::print_error(&error);
                }
                return Ok(error.exit_code());
            }
            SessionUpdate::Aborted => break,
        }
    }

    if mode == DisplayMode::Json {
        output::print_json(&FailureReport::aborted())?;
    }

    Ok(exit_codes::ABORTED)
}

/// Run tests on the interactive screen until the user leaves it.
///
/// The first quit key during a run asks the worker to stop; a second one
/// abandons it.
fn run_interactive(
    mut store: HistoryStore<JsonFileStorage>,
    load_error: Option<NetSpeedError>,
    request: &RunRequest,
) -> Result<i32, NetSpeedError> {
    let mut controller = TuiController::new(DisplayMode::Tui, Screen::Run);
    controller.state_mut().history = HistoryView::from_store(&store);
    if let Some(e) = load_error {
        controller.state_mut().set_notice(e.message);
    }

    controller.init()?;

    let mut session = RunSession::new();
    start_run(&mut session, request)?;

    let mut exit_code = exit_codes::SUCCESS;

    loop {
        while let Some(update) = session.poll() {
            controller.state_mut().run.apply(&update);

            match update {
                SessionUpdate::Event(RunEvent::Completed(result)) => {
                    let server = controller.state().run.server.clone();
                    let recorded = store.record(pending_from(&result, server.as_ref()));

                    let state = controller.state_mut();
                    state.history = HistoryView::from_store(&store);
                    if let Err(e) = recorded.persisted {
                        state.set_notice(format!("History not saved: {}", e.message));
                    }
                    exit_code = exit_codes::SUCCESS;
                }
                SessionUpdate::Event(RunEvent::Failed(failure)) => {
                    exit_code = failure.kind.exit_code();
                }
                SessionUpdate::Aborted => exit_code = exit_codes::ABORTED,
                SessionUpdate::Event(_) => {}
            }
        }

        controller.render()?;

        match controller.next_key(TICK)? {
            Some(KeyAction::Quit) => match session.state() {
                RunState::Idle => break,
                RunState::Running => {
                    session.request_stop();
                    controller.state_mut().run.stopping = true;
                }
                RunState::Stopping => {
                    if let Some(update) = session.force_stop() {
                        controller.state_mut().run.apply(&update);
                        exit_code = exit_codes::ABORTED;
                    }
                }
            },
            Some(KeyAction::Rerun) if session.is_idle() => {
                match start_run(&mut session, request) {
                    Ok(()) => controller.state_mut().reset_run(),
                    Err(e) => controller.state_mut().set_notice(e.message),
                }
            }
            Some(KeyAction::Export) if session.is_idle() => {
                let notice = match export_history(&store, None) {
                    Ok(path) => format!("Exported to {}", path.display()),
                    Err(e) => e.message,
                };
                controller.state_mut().set_notice(notice);
            }
            _ => {}
        }
    }

    controller.cleanup()?;

    Ok(exit_code)
}

fn servers_command(mode: DisplayMode) -> Result<i32, NetSpeedError> {
    let mut provider =
        CloudflareProvider::connect(DEFAULT_TIMEOUT).map_err(NetSpeedError::provider)?;
    let catalog = provider.discover_servers().map_err(NetSpeedError::provider)?;

    if mode == DisplayMode::Json {
        output::print_json(&catalog.sorted())?;
    } else {
        output::print_servers(&catalog);
    }

    Ok(exit_codes::SUCCESS)
}

fn history_command(settings: &Settings, mode: DisplayMode) -> Result<i32, NetSpeedError> {
    let (store, load_error) = open_history(settings)?;

    if mode == DisplayMode::Json {
        output::print_json(&HistoryReport {
            measurements: store.measurements().iter().rev().collect(),
            averages: store.aggregates(),
            capacity: store.capacity(),
        })?;
    } else {
        if let Some(ref e) = load_error {
            output::print_error(e);
        }
        output::print_history(store.measurements().iter().rev());
        output::print_averages(store.aggregates());
    }

    Ok(load_error.map_or(exit_codes::SUCCESS, |e| e.exit_code()))
}

fn chart_command(settings: &Settings, mode: DisplayMode) -> Result<i32, NetSpeedError> {
    if mode != DisplayMode::Tui {
        return history_command(settings, mode);
    }

    let (store, load_error) = open_history(settings)?;

    let mut controller = TuiController::new(DisplayMode::Tui, Screen::Chart);
    controller.state_mut().history = HistoryView::from_store(&store);
    if let Some(e) = load_error {
        controller.state_mut().set_notice(e.message);
    }

    controller.init()?;

    loop {
        controller.render()?;
        if controller.next_key(TICK)? == Some(KeyAction::Quit) {
            break;
        }
    }

    controller.cleanup()?;

    Ok(exit_codes::SUCCESS)
}

/// Write the history to `output`, or to a timestamped file in the current
/// directory.
fn export_history(
    store: &HistoryStore<JsonFileStorage>,
    output: Option<PathBuf>,
) -> Result<PathBuf, NetSpeedError> {
    if store.is_empty() {
        return Err(NetSpeedError::config("there is no history to export")
            .with_suggestion("Run a speed test first."));
    }

    let path = output
        .unwrap_or_else(|| PathBuf::from(export_file_name(Local::now().naive_local())));

    let file = File::create(&path).map_err(|e| {
        NetSpeedError::persistence(format!("could not create {}", path.display()))
            .with_source(e)
    })?;
    store.export(file)?;

    info!("Exported {} entries to {:?}", store.len(), path);

    Ok(path)
}

fn export_command(
    settings: &Settings,
    mode: DisplayMode,
    output: Option<PathBuf>,
) -> Result<i32, NetSpeedError> {
    let (store, load_error) = open_history(settings)?;
    if let Some(e) = load_error {
        return Err(e);
    }

    let path = export_history(&store, output)?;

    if mode == DisplayMode::Json {
        output::print_json(&serde_json::json!({
            "exported": store.len(),
            "path": path.display().to_string(),
        }))?;
    } else {
        println!("Exported {} results to {}", store.len(), path.display());
    }

    Ok(exit_codes::SUCCESS)
}

fn info_command(settings: &Settings, mode: DisplayMode) -> Result<i32, NetSpeedError> {
    let info = BuildInfo::current(settings.history_file.display().to_string());

    if mode == DisplayMode::Json {
        output::print_json(&info)?;
    } else {
        println!("netspeed {} ({})", info.version, info.git_hash);
        println!("{} {}", info.os, info.arch);
        println!("History: {}", info.history_file);
    }

    Ok(exit_codes::SUCCESS)
}
