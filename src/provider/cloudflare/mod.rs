//! Provider backed by the public Cloudflare speed test endpoints.
//!
//! Cloudflare serves every request from the anycast datacenter (colo)
//! closest to the client. Each colo listed by `/locations` is exposed as
//! a server, and the colo reported by `/meta` is the best one.

pub mod client;
pub(crate) mod requests;

use self::client::Client;
use self::requests::download::Download;
use self::requests::locations::{Location, Locations};
use self::requests::meta::{Meta, MetaRequest};
use self::requests::upload::Upload;
use super::{Provider, ServerCatalog, ServerInfo};
use crate::errors::BoxError;
use crate::measurements::{
    aggregate_bandwidth, bandwidth_bps, haversine_km, latency_ms,
};
use crate::retry::{retry_async, RetryConfig};
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

const SPONSOR: &str = "Cloudflare";

/// A data block configuration for bandwidth tests.
#[derive(Debug, Clone)]
pub struct DataBlock {
    /// Size of the data block in bytes
    pub bytes: u64,
    /// Number of transfers at this size
    pub count: usize,
}

impl DataBlock {
    pub const fn new(bytes: u64, count: usize) -> Self {
        Self { bytes, count }
    }
}

/// Transfer ladder and sampling settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Download sizes, smallest first.
    /// Default: 100KB(4), 1MB(4), 10MB(3), 25MB(2)
    pub download_sizes: Vec<DataBlock>,

    /// Upload sizes, smallest first.
    /// Default: 100KB(4), 1MB(3), 10MB(2)
    pub upload_sizes: Vec<DataBlock>,

    /// Number of empty round trips used for the latency estimate.
    pub latency_samples: usize,

    /// Once a single transfer takes this long, larger sizes are skipped.
    pub finish_duration: Duration,

    /// Backoff for the metadata and discovery requests.
    pub retry_config: RetryConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_sizes: vec![
                DataBlock::new(100_000, 4),
                DataBlock::new(1_000_000, 4),
                DataBlock::new(10_000_000, 3),
                DataBlock::new(25_000_000, 2),
            ],
            upload_sizes: vec![
                DataBlock::new(100_000, 4),
                DataBlock::new(1_000_000, 3),
                DataBlock::new(10_000_000, 2),
            ],
            latency_samples: 10,
            finish_duration: Duration::from_millis(1000),
            retry_config: RetryConfig::default(),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Download,
    Upload,
}

pub struct CloudflareProvider {
    runtime: Runtime,
    client: Client,
    meta: Meta,
    config: TransferConfig,
    catalog: Option<ServerCatalog>,
    last_ping_ms: f64,
}

impl CloudflareProvider {
    /// Connect with the default transfer ladder.
    pub fn connect(timeout: Duration) -> Result<Self, BoxError> {
        Self::connect_with(timeout, TransferConfig::default())
    }

    /// Build the HTTP client and fetch the client's connection metadata.
    pub fn connect_with(
        timeout: Duration,
        config: TransferConfig,
    ) -> Result<Self, BoxError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = Client::with_timeout(timeout)?;

        let meta = runtime.block_on(retry_async(
            &config.retry_config,
            "fetch connection metadata",
            || client.send(MetaRequest {}),
        ))?;

        info!(
            "Connected as {} ({}) via {} ({})",
            meta.client_ip, meta.as_organization, meta.colo.city, meta.colo.iata
        );

        Ok(Self {
            runtime,
            client,
            meta,
            config,
            catalog: None,
            last_ping_ms: 0.0,
        })
    }

    fn catalog(&mut self) -> Result<&ServerCatalog, BoxError> {
        if self.catalog.is_none() {
            let client = &self.client;
            let locations = self.runtime.block_on(retry_async(
                &self.config.retry_config,
                "fetch server locations",
                || client.send(Locations {}),
            ))?;

            let (lat, lon) = self.meta.coordinates();
            let servers =
                locations.iter().map(|location| server_from(location, lat, lon));

            let catalog = ServerCatalog::from_servers(servers);
            debug!("Discovered {} servers", catalog.len());
            self.catalog = Some(catalog);
        }

        self.catalog
            .as_ref()
            .ok_or_else(|| "server catalog unavailable".into())
    }

    /// Descriptor of the colo currently serving this client, built from
    /// `/meta` when `/locations` does not list it.
    fn serving_server(&self) -> ServerInfo {
        let colo = &self.meta.colo;
        let (lat, lon) = self.meta.coordinates();

        ServerInfo {
            id: colo.iata.clone(),
            sponsor: SPONSOR.to_string(),
            name: colo.city.clone(),
            country: colo.cca2.clone(),
            distance_km: haversine_km(lat, lon, colo.lat, colo.lon),
            latency_ms: 0.0,
        }
    }

    fn measure_latency(&self) -> Result<f64, BoxError> {
        let mut round_trips = Vec::with_capacity(self.config.latency_samples);

        for _ in 0..self.config.latency_samples {
            let start = Instant::now();
            self.runtime.block_on(self.client.transfer(Download { bytes: 0 }))?;
            round_trips.push(start.elapsed());
        }

        latency_ms(&round_trips)
            .ok_or_else(|| "no latency samples collected".into())
    }

    fn measure_bandwidth(&self, direction: Direction) -> Result<f64, BoxError> {
        let blocks = match direction {
            Direction::Download => &self.config.download_sizes,
            Direction::Upload => &self.config.upload_sizes,
        };

        let mut samples = Vec::new();

        for block in blocks {
            let mut finished = false;
            let upload = match direction {
                Direction::Upload => Some(Upload::new(block.bytes)),
                Direction::Download => None,
            };

            for _ in 0..block.count {
                let start = Instant::now();
                let bytes = match upload {
                    Some(ref upload) => {
                        self.runtime.block_on(self.client.transfer(upload))?;
                        upload.len()
                    }
                    None => self.runtime.block_on(
                        self.client.transfer(Download { bytes: block.bytes }),
                    )?,
                };
                let elapsed = start.elapsed();

                let bps = bandwidth_bps(bytes, elapsed);
                debug!("{} bytes in {:?}: {:.0} bps", bytes, elapsed, bps);
                samples.push(bps);

                if elapsed >= self.config.finish_duration {
                    finished = true;
                }
            }

            if finished {
                debug!(
                    "Transfers of {} bytes reached {:?}, skipping larger sizes",
                    block.bytes, self.config.finish_duration
                );
                break;
            }
        }

        aggregate_bandwidth(&samples)
            .ok_or_else(|| "no bandwidth samples collected".into())
    }
}

impl Provider for CloudflareProvider {
    fn discover_servers(&mut self) -> Result<ServerCatalog, BoxError> {
        Ok(self.catalog()?.clone())
    }

    fn select_best_server(
        &mut self,
        server_id: Option<&str>,
    ) -> Result<ServerInfo, BoxError> {
        let serving = self.meta.colo.iata.clone();

        let mut server = match server_id {
            Some(id) => {
                let server = self
                    .catalog()?
                    .find(id)
                    .cloned()
                    .ok_or_else(|| format!("server {} not found", id))?;

                if server.id != serving {
                    warn!(
                        "Cloudflare routes by anycast; traffic is still served by {}",
                        serving
                    );
                }

                server
            }
            None => {
                let listed = self.catalog()?.find(&serving).cloned();
                listed.unwrap_or_else(|| self.serving_server())
            }
        };

        let ping = self.measure_latency()?;
        server.latency_ms = ping;
        self.last_ping_ms = ping;

        Ok(server)
    }

    fn measure_download(&mut self) -> Result<f64, BoxError> {
        self.measure_bandwidth(Direction::Download)
    }

    fn measure_upload(&mut self) -> Result<f64, BoxError> {
        self.measure_bandwidth(Direction::Upload)
    }

    fn last_ping(&self) -> f64 {
        self.last_ping_ms
    }
}

fn server_from(location: &Location, lat: f64, lon: f64) -> ServerInfo {
    ServerInfo {
        id: location.iata.clone(),
        sponsor: SPONSOR.to_string(),
        name: location.city.clone(),
        country: location.cca2.clone(),
        distance_km: haversine_km(lat, lon, location.lat, location.lon),
        latency_ms: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_from_location() {
        let location = Location {
            iata: "CDG".to_string(),
            lat: 48.8566,
            lon: 2.3522,
            cca2: "FR".to_string(),
            city: "Paris".to_string(),
        };

        let server = server_from(&location, 48.8566, 2.3522);

        assert_eq!(server.id, "CDG");
        assert_eq!(server.label(), "Cloudflare (Paris)");
        assert_eq!(server.country, "FR");
        assert_eq!(server.distance_km, 0.0);
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_default_ladders_grow() {
        let config = TransferConfig::default();

        for sizes in [&config.download_sizes, &config.upload_sizes] {
            assert!(sizes.windows(2).all(|pair| pair[0].bytes < pair[1].bytes));
            assert!(sizes.iter().all(|block| block.count > 0));
        }
    }
}
