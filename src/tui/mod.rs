//! TUI (Terminal User Interface) module for netspeed.
//!
//! This module shows the progress of a run, its result, the history
//! averages and a chart of past results.

pub mod controller;
pub mod display_mode;
pub mod renderer;
pub mod state;

pub use controller::{KeyAction, TuiController};
pub use display_mode::DisplayMode;
pub use state::{HistoryView, Outcome, RunView, Screen, TuiState};
