pub fn mean_f64(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median_f64(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Linear-interpolated percentile, `percentile` in `0.0..=1.0`.
pub fn percentile_f64(values: &mut [f64], percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let pos = (values.len() - 1) as f64 * percentile.clamp(0.0, 1.0);
    let base = pos.floor();
    let rest = pos - base;
    let base = base as usize;

    if base + 1 < values.len() {
        return Some(values[base] + rest * (values[base + 1] - values[base]));
    }

    Some(values[base])
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
