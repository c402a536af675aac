use super::Request;
use serde::Deserialize;
use std::borrow::Cow;

/// One Cloudflare datacenter as listed by `/locations`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Location {
    pub iata: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub cca2: String,
    pub city: String,
}

pub(crate) struct Locations {}

impl Request for Locations {
    type Response = Vec<Location>;

    fn endpoint(&self) -> Cow<'_, str> {
        "/locations".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locations() {
        let body = r#"[
            {"iata":"CDG","lat":49.0097,"lon":2.5479,"cca2":"FR","region":"Europe","city":"Paris"},
            {"iata":"AMS","lat":52.3086,"lon":4.7639,"city":"Amsterdam"}
        ]"#;

        let locations: Vec<Location> = serde_json::from_str(body).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].cca2, "FR");
        assert_eq!(locations[1].city, "Amsterdam");
        assert!(locations[1].cca2.is_empty());
    }
}
