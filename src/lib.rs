//! netspeed runs network speed tests and keeps a rolling history of the
//! results.
//!
//! A run happens on a worker thread driven through [`runner::RunSession`].
//! Completed runs are recorded in a [`history::HistoryStore`], which keeps
//! the most recent entries in a JSON file and can export them as CSV.

pub mod config;
pub mod errors;
pub mod history;
pub mod measurements;
pub mod output;
pub mod provider;
pub mod retry;
pub mod runner;
pub mod stats;
pub mod tui;
