use serde::Serialize;

use crate::stream::types::Candle;

use super::{mean, population_std_dev};

/// Baseline used by the candle rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandleStats {
    pub avg_close: f64,
    /// Zero when no candle in the slice had positive volume.
    pub avg_volume: f64,
    pub std_dev: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// Display summary for one token's candle history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSummary {
    pub total_candles: usize,
    pub avg_price: f64,
    pub avg_volume: f64,
    pub max_price: f64,
    pub min_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub total_volume: f64,
    pub trend: Trend,
}

const TREND_THRESHOLD_PERCENT: f64 = 5.0;

/// Mean close, mean volume and population std-dev of closes over the
/// candles with a positive close. `None` when fewer than two such candles.
pub fn candle_stats(history: &[Candle]) -> Option<CandleStats> {
    if history.len() < 2 {
        return None;
    }

    let closes = positive_closes(history);
    if closes.len() < 2 {
        return None;
    }

    let volumes = positive_volumes(history);

    Some(CandleStats {
        avg_close: mean(&closes)?,
        avg_volume: mean(&volumes).unwrap_or(0.0),
        std_dev: population_std_dev(&closes)?,
        sample_size: closes.len(),
    })
}

pub fn candle_summary(history: &[Candle]) -> CandleSummary {
    let closes = positive_closes(history);
    let volumes = positive_volumes(history);

    let (Some(&first), Some(&last)) = (closes.first(), closes.last()) else {
        return CandleSummary {
            total_candles: history.len(),
            avg_price: 0.0,
            avg_volume: 0.0,
            max_price: 0.0,
            min_price: 0.0,
            price_change: 0.0,
            price_change_percent: 0.0,
            total_volume: 0.0,
            trend: Trend::Neutral,
        };
    };

    let price_change = last - first;
    let price_change_percent = price_change / first * 100.0;
    let trend = if price_change_percent > TREND_THRESHOLD_PERCENT {
        Trend::Bullish
    } else if price_change_percent < -TREND_THRESHOLD_PERCENT {
        Trend::Bearish
    } else {
        Trend::Neutral
    };

    CandleSummary {
        total_candles: history.len(),
        avg_price: mean(&closes).unwrap_or(0.0),
        avg_volume: mean(&volumes).unwrap_or(0.0),
        max_price: closes.iter().copied().fold(f64::MIN, f64::max),
        min_price: closes.iter().copied().fold(f64::MAX, f64::min),
        price_change,
        price_change_percent,
        total_volume: volumes.iter().sum(),
        trend,
    }
}

fn positive_closes(history: &[Candle]) -> Vec<f64> {
    history
        .iter()
        .filter(|c| c.has_valid_close())
        .map(|c| c.close)
        .collect()
}

fn positive_volumes(history: &[Candle]) -> Vec<f64> {
    history
        .iter()
        .map(|c| c.volume)
        .filter(|v| *v > 0.0)
        .collect()
}
