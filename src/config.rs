//! Runtime settings shared by every command.

use crate::errors::NetSpeedError;
use crate::history::{HistoryStore, JsonFileStorage, DEFAULT_CAPACITY};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the directory created under the platform data directory.
pub const APP_DIR: &str = "netspeed";

/// History file name.
pub const HISTORY_FILE: &str = "history.json";

/// Accepted range for the provider timeout, in seconds.
pub const TIMEOUT_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=300;

/// Where the history lives when no path is given:
/// `<data_local_dir>/netspeed/history.json`, or `./history.json` when the
/// platform has no data directory.
pub fn default_history_path() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join(APP_DIR).join(HISTORY_FILE),
        None => PathBuf::from(HISTORY_FILE),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub history_file: PathBuf,
    pub capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self { history_file: default_history_path(), capacity: DEFAULT_CAPACITY }
    }
}

impl Settings {
    pub fn new(history_file: Option<PathBuf>, capacity: usize) -> Self {
        Self {
            history_file: history_file.unwrap_or_else(default_history_path),
            capacity,
        }
    }

    /// Open the history store and restore its contents.
    ///
    /// A history that cannot be read is reported through `on_load_error`
    /// and the store starts empty.
    pub fn open_history(
        &self,
        on_load_error: impl FnOnce(NetSpeedError),
    ) -> Result<HistoryStore<JsonFileStorage>, NetSpeedError> {
        debug!("Using history file {:?}", self.history_file);

        let mut store =
            HistoryStore::new(JsonFileStorage::new(&self.history_file), self.capacity)?;

        if let Err(e) = store.load() {
            on_load_error(e);
        }

        Ok(store)
    }
}

/// Check a timeout given in seconds.
pub fn timeout_from_secs(secs: u64) -> Result<Duration, NetSpeedError> {
    if !TIMEOUT_RANGE_SECS.contains(&secs) {
        return Err(NetSpeedError::config(format!(
            "timeout must be between {} and {} seconds, got {}",
            TIMEOUT_RANGE_SECS.start(),
            TIMEOUT_RANGE_SECS.end(),
            secs
        )));
    }

    Ok(Duration::from_secs(secs))
}
