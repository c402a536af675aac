//! The measurement provider boundary.
//!
//! A provider knows how to find measurement servers and time transfers
//! against them. The runner drives one through the [`Provider`] trait and
//! never looks behind it.

pub mod cloudflare;

use crate::errors::{BoxError, NetSpeedError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use cloudflare::CloudflareProvider;

/// Descriptor of a candidate measurement endpoint.
///
/// Field names on the wire follow the descriptor map stored in each
/// history entry (`d` for distance, `latency` for the latency estimate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Unique server identifier
    pub id: String,
    /// Organisation hosting the server
    pub sponsor: String,
    /// Display name, usually the city
    pub name: String,
    /// Country the server is located in
    pub country: String,
    /// Distance from the client in km
    #[serde(rename = "d")]
    pub distance_km: f64,
    /// Latency estimate in ms
    #[serde(rename = "latency")]
    pub latency_ms: f64,
}

impl ServerInfo {
    /// The `"sponsor (name)"` label stored with each measurement.
    pub fn label(&self) -> String {
        format!("{} ({})", self.sponsor, self.name)
    }

    /// Check that a server selection result is usable.
    pub fn validate(&self) -> Result<(), NetSpeedError> {
        if self.id.trim().is_empty() {
            return Err(NetSpeedError::invalid_server_response(
                "server descriptor has no identifier",
            ));
        }

        for (field, value) in
            [("distance", self.distance_km), ("latency", self.latency_ms)]
        {
            if !value.is_finite() || value < 0.0 {
                return Err(NetSpeedError::invalid_server_response(format!(
                    "server {} reported an invalid {}: {}",
                    self.id, field, value
                )));
            }
        }

        Ok(())
    }

    /// The descriptor as an opaque JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Servers grouped by country.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerCatalog {
    by_country: BTreeMap<String, Vec<ServerInfo>>,
}

impl ServerCatalog {
    /// Group a flat list of servers by country.
    pub fn from_servers(servers: impl IntoIterator<Item = ServerInfo>) -> Self {
        let mut by_country: BTreeMap<String, Vec<ServerInfo>> = BTreeMap::new();

        for server in servers {
            by_country.entry(server.country.clone()).or_default().push(server);
        }

        Self { by_country }
    }

    /// Servers for one country.
    pub fn country(&self, country: &str) -> &[ServerInfo] {
        self.by_country.get(country).map(Vec::as_slice).unwrap_or_default()
    }

    /// Look a server up by identifier.
    pub fn find(&self, id: &str) -> Option<&ServerInfo> {
        self.by_country.values().flatten().find(|server| server.id == id)
    }

    /// All servers ordered by country, then name.
    pub fn sorted(&self) -> Vec<&ServerInfo> {
        let mut servers: Vec<&ServerInfo> =
            self.by_country.values().flatten().collect();

        servers.sort_by(|a, b| {
            (a.country.as_str(), a.name.as_str())
                .cmp(&(b.country.as_str(), b.name.as_str()))
        });

        servers
    }

    pub fn len(&self) -> usize {
        self.by_country.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A network measurement backend.
///
/// Every method blocks until the provider has an answer. Throughput is
/// reported in bits per second.
pub trait Provider {
    /// List every known server, grouped by country.
    fn discover_servers(&mut self) -> Result<ServerCatalog, BoxError>;

    /// Pick the best server, or resolve the one with the given id.
    fn select_best_server(
        &mut self,
        server_id: Option<&str>,
    ) -> Result<ServerInfo, BoxError>;

    /// Measure download throughput against the selected server.
    fn measure_download(&mut self) -> Result<f64, BoxError>;

    /// Measure upload throughput against the selected server.
    fn measure_upload(&mut self) -> Result<f64, BoxError>;

    /// Latency to the selected server in ms, as measured during selection.
    fn last_ping(&self) -> f64;
}
