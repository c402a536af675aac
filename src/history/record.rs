use crate::provider::ServerInfo;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp layout used in the history file and in exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Label stored when no server was announced before the result.
pub const UNKNOWN_SERVER_LABEL: &str = "? (?)";

/// One completed speed test as kept in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Download throughput in Mbps
    pub download: f64,
    /// Upload throughput in Mbps
    pub upload: f64,
    /// Round-trip latency in ms
    pub ping: f64,
    /// Local completion time, second precision
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    /// Sequence number assigned by the history store
    pub count: u64,
    /// `"sponsor (name)"` of the server used
    pub server: String,
    /// Descriptor of the server used, kept as an opaque map
    #[serde(default)]
    pub server_info: Map<String, Value>,
}

impl Measurement {
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// A measurement that has not been given a sequence number yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMeasurement {
    pub download: f64,
    pub upload: f64,
    pub ping: f64,
    pub timestamp: NaiveDateTime,
    pub server: String,
    pub server_info: Map<String, Value>,
}

impl PendingMeasurement {
    /// Build a pending entry from a run's figures and the server that
    /// was announced for it, if any.
    pub fn new(
        download: f64,
        upload: f64,
        ping: f64,
        timestamp: NaiveDateTime,
        server: Option<&ServerInfo>,
    ) -> Self {
        let (label, info) = match server {
            Some(server) => (server.label(), server.to_map()),
            None => (UNKNOWN_SERVER_LABEL.to_string(), Map::new()),
        };

        Self { download, upload, ping, timestamp, server: label, server_info: info }
    }

    pub(crate) fn into_measurement(self, count: u64) -> Measurement {
        Measurement {
            download: self.download,
            upload: self.upload,
            ping: self.ping,
            timestamp: self.timestamp,
            count,
            server: self.server,
            server_info: self.server_info,
        }
    }
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        timestamp: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
            .map_err(D::Error::custom)
    }
}
