use crate::stats::{median_f64, percentile_f64};
use std::time::Duration;

/// Bits per second for `bytes` moved in `duration`.
///
/// Returns 0.0 when the duration is zero.
pub fn bandwidth_bps(bytes: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();

    if seconds <= 0.0 {
        return 0.0;
    }

    (bytes as f64 * 8.0) / seconds
}

/// Convert bits per second to megabits per second.
pub fn bps_to_mbps(bps: f64) -> f64 {
    bps / 1_000_000.0
}

/// Round-trip latency in ms: the median of a set of empty round trips.
pub fn latency_ms(round_trips: &[Duration]) -> Option<f64> {
    let mut millis: Vec<f64> = round_trips
        .iter()
        .map(|duration| duration.as_nanos() as f64 / 1_000_000.0)
        .collect();

    median_f64(&mut millis)
}

/// Final throughput of a transfer ladder: the 90th percentile of the
/// per-request rates.
pub fn aggregate_bandwidth(samples_bps: &[f64]) -> Option<f64> {
    let mut samples = samples_bps.to_vec();

    percentile_f64(&mut samples, 0.9)
}

/// Great-circle distance in km between two coordinates.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos()
            * lat2.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bandwidth_bps() {
        // 1 MB in one second is 8 Mbps
        let bps = bandwidth_bps(1_000_000, Duration::from_secs(1));
        assert_eq!(bps, 8_000_000.0);
        assert_eq!(bps_to_mbps(bps), 8.0);
    }

    #[test]
    fn test_bandwidth_zero_duration() {
        assert_eq!(bandwidth_bps(1_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_latency_is_median_round_trip() {
        let round_trips = [
            Duration::from_millis(30),
            Duration::from_millis(20),
            Duration::from_millis(40),
        ];
        assert_eq!(latency_ms(&round_trips), Some(30.0));
        assert_eq!(latency_ms(&[Duration::from_millis(20)]), Some(20.0));
        assert_eq!(latency_ms(&[]), None);
    }

    #[test]
    fn test_aggregate_bandwidth_uses_p90() {
        let samples: Vec<f64> = (1..=11).map(|i| i as f64).collect();
        assert_eq!(aggregate_bandwidth(&samples), Some(10.0));
        assert_eq!(aggregate_bandwidth(&[]), None);
    }

    #[test]
    fn test_haversine() {
        assert_eq!(haversine_km(48.85, 2.35, 48.85, 2.35), 0.0);
        // Paris to London is roughly 344 km
        let distance = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((distance - 344.0).abs() < 5.0);
    }
}
