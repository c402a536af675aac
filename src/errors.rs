//! Custom error types for netspeed.
//!
//! This module provides user-friendly error types that wrap underlying
//! errors with clear, actionable messages. None of these errors are fatal
//! to the process: each one is surfaced to the user and leaves the
//! application ready for another attempt.

use std::error::Error;
use std::fmt;

/// Boxed error used at the provider seam and by the worker thread.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Exit codes for the application.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// The speed test itself failed (provider or server selection).
    pub const RUN_FAILED: i32 = 1;
    /// The history file could not be read or written.
    pub const STORAGE_ERROR: i32 = 2;
    /// Configuration error (invalid arguments, run already active).
    pub const CONFIG_ERROR: i32 = 3;
    /// The run was stopped before producing a result.
    pub const ABORTED: i32 = 4;
    /// Terminal setup or teardown failed.
    pub const DISPLAY_ERROR: i32 = 5;
}

/// Categories of errors that can occur in netspeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The provider's server selection was not a well-formed descriptor.
    InvalidServerResponse,
    /// The provider failed during discovery or measurement.
    Provider,
    /// The history file is unreadable or unwritable.
    Persistence,
    /// The history file exists but does not contain valid history.
    MalformedStorage,
    /// Invalid configuration or caller misuse.
    Config,
    /// The terminal could not be driven.
    Display,
}

impl ErrorKind {
    /// Get the exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidServerResponse => exit_codes::RUN_FAILED,
            ErrorKind::Provider => exit_codes::RUN_FAILED,
            ErrorKind::Persistence => exit_codes::STORAGE_ERROR,
            ErrorKind::MalformedStorage => exit_codes::STORAGE_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::Display => exit_codes::DISPLAY_ERROR,
        }
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::InvalidServerResponse => "Invalid server response",
            ErrorKind::Provider => "Speed test error",
            ErrorKind::Persistence => "History storage error",
            ErrorKind::MalformedStorage => "Malformed history file",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Display => "Display error",
        }
    }
}

/// A user-friendly error type for netspeed operations.
#[derive(Debug)]
pub struct NetSpeedError {
    /// The kind of error.
    pub kind: ErrorKind,
    /// User-friendly error message.
    pub message: String,
    /// Optional suggestion for how to resolve the error.
    pub suggestion: Option<String>,
    /// The underlying error, if any.
    pub source: Option<BoxError>,
}

impl NetSpeedError {
    /// Create a new NetSpeedError.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// Add a suggestion for how to resolve the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add the underlying error source.
    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Create an invalid server response error.
    pub fn invalid_server_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidServerResponse, message).with_suggestion(
            "Refresh the server list or let netspeed pick a server.",
        )
    }

    /// Create a provider error from the underlying failure.
    ///
    /// The suggestion is chosen by classifying the failure text.
    pub fn provider(error: BoxError) -> Self {
        let message = error.to_string();
        let suggestion = suggestion_for(error.as_ref());
        let mut provider_error = Self::new(ErrorKind::Provider, message);
        provider_error.suggestion = suggestion.map(str::to_string);
        provider_error.source = Some(error);
        provider_error
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Persistence, message).with_suggestion(
            "Check that the history file location is writable.",
        )
    }

    /// Create a malformed storage error.
    pub fn malformed_storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedStorage, message)
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Create a display error.
    pub fn display(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Display, message)
    }
}

impl fmt::Display for NetSpeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for NetSpeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Pick a suggestion for a provider failure based on its message.
pub fn suggestion_for(error: &dyn Error) -> Option<&'static str> {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("dns")
        || error_str.contains("resolve")
        || error_str.contains("no such host")
    {
        return Some(
            "Check your DNS settings or try using a different DNS server.",
        );
    }

    if error_str.contains("timeout")
        || error_str.contains("timed out")
        || error_str.contains("deadline")
    {
        return Some(
            "The server may be slow or unreachable. Try a longer timeout.",
        );
    }

    if error_str.contains("tls")
        || error_str.contains("ssl")
        || error_str.contains("certificate")
        || error_str.contains("handshake")
    {
        return Some(
            "There may be a certificate issue. Check your system time.",
        );
    }

    if error_str.contains("connection refused")
        || error_str.contains("connection reset")
        || error_str.contains("network unreachable")
        || error_str.contains("host unreachable")
        || error_str.contains("no route")
        || error_str.contains("broken pipe")
        || error_str.contains("error sending request")
    {
        return Some("Check your internet connection and try again.");
    }

    None
}

/// Format an error for user display.
///
/// This function creates a user-friendly error message that includes
/// the error message and any available suggestion.
pub fn format_error_for_display(error: &NetSpeedError) -> String {
    let mut output = format!("Error: {}", error.message);

    if let Some(ref suggestion) = error.suggestion {
        output.push_str(&format!("\n\nSuggestion: {}", suggestion));
    }

    output
}
