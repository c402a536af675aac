use super::Request;
use serde::Deserialize;
use std::borrow::Cow;

/// Cloudflare datacenter (colo) information.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Colo {
    /// IATA airport code for the datacenter location
    pub iata: String,
    /// Latitude of the datacenter
    pub lat: f64,
    /// Longitude of the datacenter
    pub lon: f64,
    /// ISO 3166-1 alpha-2 country code
    #[serde(default)]
    pub cca2: String,
    /// City name
    pub city: String,
}

/// Connection metadata for the calling client.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Meta {
    #[serde(rename = "clientIp", default)]
    pub client_ip: String,
    #[serde(rename = "asOrganization", default)]
    pub as_organization: String,
    /// Datacenter currently serving this client
    pub colo: Colo,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
}

impl Meta {
    /// Client coordinates, falling back to the serving datacenter.
    pub fn coordinates(&self) -> (f64, f64) {
        let parse = |value: &Option<String>| {
            value.as_deref().and_then(|v| v.trim().parse::<f64>().ok())
        };

        match (parse(&self.latitude), parse(&self.longitude)) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => (self.colo.lat, self.colo.lon),
        }
    }
}

pub(crate) struct MetaRequest {}

impl Request for MetaRequest {
    type Response = Meta;

    fn endpoint(&self) -> Cow<'_, str> {
        "/meta".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "hostname": "speed.cloudflare.com",
        "clientIp": "203.0.113.7",
        "httpProtocol": "HTTP/1.1",
        "asn": 3215,
        "asOrganization": "Example Telecom",
        "colo": {"iata":"CDG","lat":49.0097,"lon":2.5479,"cca2":"FR","region":"Europe","city":"Paris"},
        "country": "FR",
        "latitude": "48.85",
        "longitude": "2.35"
    }"#;

    #[test]
    fn test_parse_meta() {
        let meta: Meta = serde_json::from_str(BODY).unwrap();
        assert_eq!(meta.client_ip, "203.0.113.7");
        assert_eq!(meta.colo.iata, "CDG");
        assert_eq!(meta.coordinates(), (48.85, 2.35));
    }

    #[test]
    fn test_coordinates_fall_back_to_colo() {
        let mut meta: Meta = serde_json::from_str(BODY).unwrap();
        meta.latitude = None;
        assert_eq!(meta.coordinates(), (49.0097, 2.5479));
    }
}
