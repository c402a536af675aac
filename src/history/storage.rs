use super::record::Measurement;
use crate::errors::NetSpeedError;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where the history lives between runs.
pub trait HistoryStorage {
    /// Read the stored history, oldest first.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<Vec<Measurement>>, NetSpeedError>;

    /// Replace the stored history with `records`.
    fn write(&mut self, records: &[Measurement]) -> Result<(), NetSpeedError>;

    /// Human-readable location, for messages.
    fn location(&self) -> String;
}

/// History kept as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

impl HistoryStorage for JsonFileStorage {
    fn read(&self) -> Result<Option<Vec<Measurement>>, NetSpeedError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("History file does not exist: {:?}", self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(NetSpeedError::persistence(format!(
                    "could not read {}",
                    self.path.display()
                ))
                .with_source(e));
            }
        };

        let records: Vec<Measurement> =
            serde_json::from_str(&content).map_err(|e| {
                NetSpeedError::malformed_storage(format!(
                    "{} is not a valid history file",
                    self.path.display()
                ))
                .with_source(e)
            })?;

        Ok(Some(records))
    }

    fn write(&mut self, records: &[Measurement]) -> Result<(), NetSpeedError> {
        let failed = |e: io::Error| {
            NetSpeedError::persistence(format!(
                "could not write {}",
                self.path.display()
            ))
            .with_source(e)
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(failed)?;
            }
        }

        let content = serde_json::to_string_pretty(records)
            .map_err(|e| failed(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let staging = self.staging_path();
        fs::write(&staging, content).map_err(failed)?;
        fs::rename(&staging, &self.path).map_err(failed)?;

        debug!("Saved {} entries to {:?}", records.len(), self.path);

        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// In-memory storage; clones share the same contents.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MemoryStorage {
        pub(crate) contents: Rc<RefCell<Option<Vec<Measurement>>>>,
        pub(crate) writes: Rc<RefCell<usize>>,
    }

    impl HistoryStorage for MemoryStorage {
        fn read(&self) -> Result<Option<Vec<Measurement>>, NetSpeedError> {
            Ok(self.contents.borrow().clone())
        }

        fn write(&mut self, records: &[Measurement]) -> Result<(), NetSpeedError> {
            *self.contents.borrow_mut() = Some(records.to_vec());
            *self.writes.borrow_mut() += 1;
            Ok(())
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    /// Storage that can neither be read nor written.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct BrokenStorage;

    impl HistoryStorage for BrokenStorage {
        fn read(&self) -> Result<Option<Vec<Measurement>>, NetSpeedError> {
            Err(NetSpeedError::persistence("permission denied"))
        }

        fn write(&mut self, _records: &[Measurement]) -> Result<(), NetSpeedError> {
            Err(NetSpeedError::persistence("read-only file system"))
        }

        fn location(&self) -> String {
            "broken".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::history::record::testing::{at, pending};
    use crate::history::PendingMeasurement;
    use crate::measurements::haversine_km;
    use crate::provider::testing::server;

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("history.json"));

        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage =
            JsonFileStorage::new(dir.path().join("nested").join("history.json"));
        let records = vec![
            pending(10.0, 1.0, 20.0).into_measurement(1),
            pending(20.0, 2.0, 15.0).into_measurement(2),
        ];

        storage.write(&records).unwrap();

        assert_eq!(storage.read().unwrap(), Some(records));
        assert!(!storage.staging_path().exists());
    }

    #[test]
    fn test_computed_distances_read_back_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonFileStorage::new(dir.path().join("history.json"));

        let records: Vec<Measurement> = [
            (48.8566, 2.3522, 51.5074, -0.1278),
            (40.7128, -74.006, 34.0522, -118.2437),
            (35.6762, 139.6503, -33.8688, 151.2093),
            (52.52, 13.405, 41.9028, 12.4964),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (lat1, lon1, lat2, lon2))| {
            let mut colo = server("CDG", "Paris", "FR");
            colo.distance_km = haversine_km(lat1, lon1, lat2, lon2);
            colo.latency_ms = colo.distance_km / 97.0;
            PendingMeasurement::new(93.41, 40.02, 12.5, at(i as u32), Some(&colo))
                .into_measurement(i as u64 + 1)
        })
        .collect();

        storage.write(&records).unwrap();

        assert_eq!(storage.read().unwrap(), Some(records));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let error = JsonFileStorage::new(path).read().unwrap_err();
        assert_eq!(error.kind, ErrorKind::MalformedStorage);
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, r#"{"download": 1.0}"#).unwrap();

        let error = JsonFileStorage::new(path).read().unwrap_err();
        assert_eq!(error.kind, ErrorKind::MalformedStorage);
    }

    #[test]
    fn test_unwritable_location_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        // A regular file stands where the parent directory should be
        let mut storage = JsonFileStorage::new(blocker.join("history.json"));
        let error = storage.write(&[]).unwrap_err();

        assert_eq!(error.kind, ErrorKind::Persistence);
    }
}
