//! Rolling statistics over history slices. Everything here recomputes from
//! the slice it is given; nothing is maintained incrementally.

pub mod candle;
pub mod transaction;

pub use candle::{candle_stats, candle_summary, CandleStats, CandleSummary, Trend};
pub use transaction::{transaction_stats, TransactionStats};

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation, `sqrt(mean((x - mean)^2))`.
/// `None` for fewer than two samples.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance = values.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
