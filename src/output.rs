//! Plain and JSON output for the non-interactive modes.
//!
//! Every JSON document printed by netspeed is one of the report types
//! below, serialized with `serde_json`.

use colored::Colorize;
use serde::Serialize;

use crate::errors::{format_error_for_display, ErrorKind, NetSpeedError};
use crate::history::{Aggregates, Measurement};
use crate::provider::{ServerCatalog, ServerInfo};

/// Result of `netspeed run`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub measurement: &'a Measurement,
    /// Averages over the history, this run included
    pub averages: Option<Aggregates>,
    /// Whether the history file was updated
    pub saved: bool,
    pub history_file: String,
    /// Why the earlier history could not be loaded, when it could not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_warning: Option<String>,
}

/// A run that produced no measurement.
#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// True when the run was stopped rather than failed
    pub aborted: bool,
}

impl FailureReport {
    pub fn from_error(error: &NetSpeedError) -> Self {
        Self {
            error: error.message.clone(),
            suggestion: error.suggestion.clone(),
            aborted: false,
        }
    }

    pub fn aborted() -> Self {
        Self {
            error: "the speed test was stopped before producing a result".to_string(),
            suggestion: None,
            aborted: true,
        }
    }
}

/// Result of `netspeed history`.
#[derive(Debug, Serialize)]
pub struct HistoryReport<'a> {
    /// Newest first
    pub measurements: Vec<&'a Measurement>,
    pub averages: Option<Aggregates>,
    pub capacity: usize,
}

/// Result of `netspeed info`.
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub history_file: String,
}

impl BuildInfo {
    pub fn current(history_file: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: option_env!("NETSPEED_BUILD_GIT_HASH").unwrap_or("unknown"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            history_file,
        }
    }
}

/// Print a report as pretty JSON on stdout.
pub fn print_json<T: Serialize>(report: &T) -> Result<(), NetSpeedError> {
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        NetSpeedError::new(ErrorKind::Display, "could not encode the report").with_source(e)
    })?;
    println!("{}", json);
    Ok(())
}

pub fn print_server(server: &ServerInfo) {
    println!(
        "{} {} {}",
        "Server:".bold().white(),
        server.label().bright_blue(),
        format!("[{}] {:.1} km", server.id, server.distance_km).bright_blue()
    );
}

pub fn print_measurement(measurement: &Measurement) {
    println!(
        "{} {}",
        "Download speed:".bold().white(),
        format!("{:.2} Mbps", measurement.download).bright_cyan()
    );
    println!(
        "{} {}",
        "Upload speed:".bold().white(),
        format!("{:.2} Mbps", measurement.upload).bright_cyan()
    );
    println!("{} {:.2} ms", "Ping:".bold().white(), measurement.ping);
    println!(
        "{} #{} at {}",
        "Recorded:".bold().white(),
        measurement.count,
        measurement.timestamp_string()
    );
}

pub fn print_averages(aggregates: Option<Aggregates>) {
    match aggregates {
        Some(aggregates) => println!(
            "{} {:.2} Mbps down, {:.2} Mbps up, {:.2} ms over {} tests",
            "Averages:".bold().white(),
            aggregates.download_mbps,
            aggregates.upload_mbps,
            aggregates.ping_ms,
            aggregates.count
        ),
        None => println!("{}", "No tests recorded yet.".dimmed()),
    }
}

/// One line of the history listing.
pub fn history_row(measurement: &Measurement) -> String {
    format!(
        "{:>4}  {}  {:>9.2}  {:>9.2}  {:>8.2}  {}",
        measurement.count,
        measurement.timestamp_string(),
        measurement.download,
        measurement.upload,
        measurement.ping,
        measurement.server
    )
}

/// Print the history, newest first.
pub fn print_history<'a>(measurements: impl IntoIterator<Item = &'a Measurement>) {
    println!(
        "{}",
        format!(
            "{:>4}  {:<19}  {:>9}  {:>9}  {:>8}  {}",
            "#", "Date", "Down Mbps", "Up Mbps", "Ping ms", "Server"
        )
        .bold()
        .white()
    );

    for measurement in measurements {
        println!("{}", history_row(measurement));
    }
}

/// One line of the server listing.
pub fn server_row(server: &ServerInfo) -> String {
    format!(
        "{:<6} {:<3} {:<28} {:>9.1} km",
        server.id,
        server.country,
        server.label(),
        server.distance_km
    )
}

pub fn print_servers(catalog: &ServerCatalog) {
    for server in catalog.sorted() {
        println!("{}", server_row(server));
    }
}

pub fn print_error(error: &NetSpeedError) {
    eprintln!("{}", format_error_for_display(error).red());
}
