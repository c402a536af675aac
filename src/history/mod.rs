//! Bounded history of completed speed tests.
//!
//! The store keeps the most recent `capacity` measurements in memory,
//! oldest first, and writes the whole list back to storage on every
//! change. Sequence numbers handed out by the store only ever grow, across
//! eviction and across reloads.

pub mod export;
pub mod record;
pub mod storage;

pub use export::{export_file_name, EXPORT_HEADER};
pub use record::{Measurement, PendingMeasurement, UNKNOWN_SERVER_LABEL};
pub use storage::{HistoryStorage, JsonFileStorage};

use crate::errors::{ErrorKind, NetSpeedError};
use crate::stats::mean_f64;
use log::{debug, warn};
use serde::Serialize;
use std::io::Write;

/// Number of measurements kept when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Mean figures over the whole history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregates {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub count: usize,
}

impl Aggregates {
    fn compute(records: &[Measurement]) -> Option<Self> {
        let column = |pick: fn(&Measurement) -> f64| {
            mean_f64(&records.iter().map(pick).collect::<Vec<_>>())
        };

        Some(Self {
            download_mbps: column(|m| m.download)?,
            upload_mbps: column(|m| m.upload)?,
            ping_ms: column(|m| m.ping)?,
            count: records.len(),
        })
    }
}

/// Outcome of [`HistoryStore::record`].
///
/// The measurement is part of the in-memory history whatever `persisted`
/// says.
#[derive(Debug)]
pub struct Recorded {
    pub measurement: Measurement,
    pub persisted: Result<(), NetSpeedError>,
}

pub struct HistoryStore<S> {
    storage: S,
    capacity: usize,
    records: Vec<Measurement>,
    next_count: u64,
    aggregates: Option<Aggregates>,
}

impl<S: HistoryStorage> HistoryStore<S> {
    /// Create an empty store. Call [`load`](Self::load) to restore what
    /// `storage` holds.
    pub fn new(storage: S, capacity: usize) -> Result<Self, NetSpeedError> {
        if capacity == 0 {
            return Err(NetSpeedError::config("history capacity must be at least 1")
                .with_suggestion("Pass --capacity with a value of 1 or more."));
        }

        Ok(Self {
            storage,
            capacity,
            records: Vec::with_capacity(capacity),
            next_count: 1,
            aggregates: None,
        })
    }

    /// Replace the in-memory history with what storage holds.
    ///
    /// Missing or malformed storage leaves the history empty and is not an
    /// error. Storage that cannot be read leaves the history empty and
    /// returns the error so it can be reported.
    pub fn load(&mut self) -> Result<(), NetSpeedError> {
        self.records.clear();

        let result = match self.storage.read() {
            Ok(Some(records)) => {
                self.restore(records);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) if e.kind == ErrorKind::MalformedStorage => {
                warn!("{}; starting with an empty history", e);
                Ok(())
            }
            Err(e) => Err(e),
        };

        self.aggregates = Aggregates::compute(&self.records);

        result
    }

    fn restore(&mut self, mut records: Vec<Measurement>) {
        if let Some(highest) = records.iter().map(|m| m.count).max() {
            self.next_count = self.next_count.max(highest + 1);
        }

        if records.len() > self.capacity {
            let excess = records.len() - self.capacity;
            debug!("Dropping {} stored entries over capacity", excess);
            records.drain(..excess);
        }

        debug!(
            "Loaded {} entries from {}, next number {}",
            records.len(),
            self.storage.location(),
            self.next_count
        );

        self.records = records;
    }

    /// Number `pending`, append it, evict the oldest entry if over
    /// capacity, then persist and refresh the aggregates.
    pub fn record(&mut self, pending: PendingMeasurement) -> Recorded {
        let measurement = pending.into_measurement(self.next_count);
        self.next_count += 1;

        self.records.push(measurement.clone());
        if self.records.len() > self.capacity {
            let evicted = self.records.remove(0);
            debug!("Evicted entry {}", evicted.count);
        }

        self.aggregates = Aggregates::compute(&self.records);

        let persisted = self.storage.write(&self.records);
        if let Err(ref e) = persisted {
            warn!("History not saved: {}", e);
        }

        Recorded { measurement, persisted }
    }

    /// Means over the current history, `None` when it is empty.
    pub fn aggregates(&self) -> Option<Aggregates> {
        self.aggregates
    }

    /// The history, oldest first.
    pub fn measurements(&self) -> &[Measurement] {
        &self.records
    }

    /// Write the history as semicolon-delimited text.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), NetSpeedError> {
        export::write_csv(writer, &self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number the next recorded measurement will get.
    pub fn next_count(&self) -> u64 {
        self.next_count
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
