//! Output mode selection.
//!
//! The interactive screen is only used when stdout is a terminal and no
//! machine-readable output was asked for.

use std::io::IsTerminal;

/// How results are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Full-screen progress, results and history chart
    Tui,
    /// Plain lines on stdout, no terminal control
    Silent,
    /// A single JSON document on stdout
    Json,
}

impl DisplayMode {
    /// `--json` always wins; otherwise a terminal gets the TUI.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        match (json_flag, is_tty) {
            (true, _) => DisplayMode::Json,
            (false, true) => DisplayMode::Tui,
            (false, false) => DisplayMode::Silent,
        }
    }

    /// Detect the mode for the current process's stdout.
    pub fn for_stdout(json_flag: bool) -> Self {
        Self::detect(json_flag, std::io::stdout().is_terminal())
    }

    pub fn is_interactive(&self) -> bool {
        *self == DisplayMode::Tui
    }
}
