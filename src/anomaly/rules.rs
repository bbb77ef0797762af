use chrono::{DateTime, Utc};

use crate::config::CandleRulesConfig;
use crate::stats::CandleStats;
use crate::stream::types::{Candle, TransactionEvent, TxStatus};

use super::types::{Anomaly, AnomalyType, Severity, ValueUnit};

// ============================================================
// Candle rules
// ============================================================

/// Check if the close deviates from the baseline mean by more than
/// `multiplier` standard deviations, measured in percentage points.
pub fn check_price_spike(
    candle: &Candle,
    stats: &CandleStats,
    config: &CandleRulesConfig,
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    if stats.avg_close <= 0.0 {
        return None;
    }

    let pct_dev = (candle.close - stats.avg_close) / stats.avg_close * 100.0;
    if pct_dev.abs() <= config.price_spike_std_multiplier * stats.std_dev {
        return None;
    }

    let severity = if pct_dev.abs() > config.price_spike_critical_multiplier * stats.std_dev {
        Severity::Critical
    } else {
        Severity::High
    };
    let (title, direction) = if pct_dev > 0.0 {
        ("Price Surge Detected", "increase")
    } else {
        ("Price Drop Detected", "decrease")
    };

    Some(Anomaly {
        kind: AnomalyType::PriceSpike,
        severity,
        title: title.to_string(),
        message: format!("{:.2}% {} from average", pct_dev.abs(), direction),
        details: format!(
            "Price: {:.6} vs Avg: {:.6}",
            candle.close, stats.avg_close
        ),
        value: pct_dev,
        unit: ValueUnit::Percent,
        subject: candle.token.symbol.clone(),
        created_at: now,
    })
}

/// Check if volume exceeds the baseline average by the configured ratio.
pub fn check_volume_spike(
    candle: &Candle,
    stats: &CandleStats,
    config: &CandleRulesConfig,
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    if stats.avg_volume <= 0.0 {
        return None;
    }

    let ratio = candle.volume / stats.avg_volume;
    if ratio <= config.volume_spike_ratio {
        return None;
    }

    let severity = if ratio > config.volume_spike_critical_ratio {
        Severity::Critical
    } else {
        Severity::High
    };

    Some(Anomaly {
        kind: AnomalyType::VolumeSpike,
        severity,
        title: "Volume Spike Detected".to_string(),
        message: format!("{:.2}x higher than average volume", ratio),
        details: format!(
            "Volume: {:.4e} vs Avg: {:.4e}",
            candle.volume, stats.avg_volume
        ),
        value: ratio,
        unit: ValueUnit::Ratio,
        subject: candle.token.symbol.clone(),
        created_at: now,
    })
}

/// Check if the high-low spread blew out relative to the previous candle.
pub fn check_volatility(
    candle: &Candle,
    previous: &Candle,
    config: &CandleRulesConfig,
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    let spread = candle.spread();
    let last_spread = match previous.spread() {
        s if s == 0.0 => config.spread_epsilon,
        s => s,
    };

    if spread <= last_spread * config.volatility_multiplier {
        return None;
    }

    let ratio = spread / last_spread;

    Some(Anomaly {
        kind: AnomalyType::HighVolatility,
        severity: Severity::Warning,
        title: "High Volatility Detected".to_string(),
        message: format!("Price spread is {:.2}x higher than normal", ratio),
        details: format!("Spread: {:.6} vs Avg: {:.6}", spread, last_spread),
        value: ratio,
        unit: ValueUnit::Ratio,
        subject: candle.token.symbol.clone(),
        created_at: now,
    })
}

// ============================================================
// Transaction rules
// ============================================================

/// Check if the absolute amount exceeds the large-transaction threshold.
pub fn check_large_transaction(
    tx: &TransactionEvent,
    threshold: f64,
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    let amount = tx.abs_amount_f64();
    if amount <= threshold {
        return None;
    }

    Some(Anomaly {
        kind: AnomalyType::LargeTransaction,
        severity: Severity::Warning,
        title: "Large Transaction Detected".to_string(),
        message: format!("Unusual amount: {:.2} {}", amount, tx.token),
        details: format!("TX {} exceeds threshold {:.2}", tx.hash, threshold),
        value: amount,
        unit: ValueUnit::Amount,
        subject: tx.hash.clone(),
        created_at: now,
    })
}

pub fn check_failed_transaction(tx: &TransactionEvent, now: DateTime<Utc>) -> Option<Anomaly> {
    if tx.status != TxStatus::Failed {
        return None;
    }

    Some(Anomaly {
        kind: AnomalyType::FailedTransaction,
        severity: Severity::Critical,
        title: "Transaction Failed".to_string(),
        message: format!("TX {} failed - possible security issue", tx.hash),
        details: format!("{} {} {}", tx.kind.as_str(), tx.amount, tx.token),
        value: 1.0,
        unit: ValueUnit::Count,
        subject: tx.hash.clone(),
        created_at: now,
    })
}

/// Check if the caller-supplied recent activity count exceeds the threshold.
pub fn check_activity_burst(
    tx: &TransactionEvent,
    recent_count: usize,
    threshold: usize,
    now: DateTime<Utc>,
) -> Option<Anomaly> {
    if recent_count <= threshold {
        return None;
    }

    Some(Anomaly {
        kind: AnomalyType::ActivityBurst,
        severity: Severity::Info,
        title: "Unusual Activity".to_string(),
        message: format!("{} transactions in the recent window", recent_count),
        details: format!("Latest: TX {} ({})", tx.hash, tx.token),
        value: recent_count as f64,
        unit: ValueUnit::Count,
        subject: tx.hash.clone(),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::types::{test_candle, test_transaction};

    fn stats(avg_close: f64, avg_volume: f64, std_dev: f64) -> CandleStats {
        CandleStats {
            avg_close,
            avg_volume,
            std_dev,
            sample_size: 3,
        }
    }

    fn ranged(close: f64, high: f64, low: f64) -> Candle {
        Candle {
            high,
            low,
            ..test_candle("SOL", close, 100.0)
        }
    }

    #[test]
    fn test_price_at_average_does_not_fire() {
        let config = CandleRulesConfig::default();
        let candle = test_candle("SOL", 1.0, 100.0);
        assert!(check_price_spike(&candle, &stats(1.0, 100.0, 0.5), &config, Utc::now()).is_none());
    }

    #[test]
    fn test_price_spike_boundary_is_strict() {
        let config = CandleRulesConfig::default();
        // pct_dev = 50%, 2 * std = 50 -> not strictly greater
        let candle = test_candle("SOL", 1.5, 100.0);
        assert!(check_price_spike(&candle, &stats(1.0, 100.0, 25.0), &config, Utc::now()).is_none());

        // pct_dev = 50%, 2 * std = 40 -> fires, 3 * std = 60 -> HIGH
        let anomaly = check_price_spike(&candle, &stats(1.0, 100.0, 20.0), &config, Utc::now()).unwrap();
        assert_eq!(anomaly.severity, Severity::High);
        assert_eq!(anomaly.title, "Price Surge Detected");
    }

    #[test]
    fn test_price_drop_critical() {
        let config = CandleRulesConfig::default();
        let candle = test_candle("SOL", 0.5, 100.0);
        let anomaly = check_price_spike(&candle, &stats(1.0, 100.0, 1.0), &config, Utc::now()).unwrap();
        assert_eq!(anomaly.severity, Severity::Critical);
        assert_eq!(anomaly.title, "Price Drop Detected");
        assert_eq!(anomaly.display_value(), "-50.00%");
        assert_eq!(anomaly.subject, "SOL");
    }

    #[test]
    fn test_volume_spike_severity_split() {
        let config = CandleRulesConfig::default();
        let s = stats(1.0, 100.0, 0.0);

        let high = check_volume_spike(&test_candle("SOL", 1.0, 250.0), &s, &config, Utc::now()).unwrap();
        assert_eq!(high.severity, Severity::High);
        assert_eq!(high.display_value(), "2.50x");

        let critical = check_volume_spike(&test_candle("SOL", 1.0, 600.0), &s, &config, Utc::now()).unwrap();
        assert_eq!(critical.severity, Severity::Critical);

        assert!(check_volume_spike(&test_candle("SOL", 1.0, 200.0), &s, &config, Utc::now()).is_none());
    }

    #[test]
    fn test_volume_spike_skipped_without_baseline_volume() {
        let config = CandleRulesConfig::default();
        let candle = test_candle("SOL", 1.0, 1_000_000.0);
        assert!(check_volume_spike(&candle, &stats(1.0, 0.0, 0.0), &config, Utc::now()).is_none());
    }

    #[test]
    fn test_volatility_against_previous_spread() {
        let config = CandleRulesConfig::default();
        let previous = ranged(1.0, 1.01, 0.99); // spread 0.02
        let calm = ranged(1.0, 1.02, 0.98); // spread 0.04
        let wild = ranged(1.0, 1.05, 0.95); // spread 0.10

        assert!(check_volatility(&calm, &previous, &config, Utc::now()).is_none());
        let anomaly = check_volatility(&wild, &previous, &config, Utc::now()).unwrap();
        assert_eq!(anomaly.severity, Severity::Warning);
        assert_eq!(anomaly.kind, AnomalyType::HighVolatility);
    }

    #[test]
    fn test_volatility_zero_previous_spread_uses_epsilon() {
        let config = CandleRulesConfig::default();
        let flat = ranged(1.0, 1.0, 1.0);
        let anomaly = check_volatility(&ranged(1.0, 1.001, 0.999), &flat, &config, Utc::now()).unwrap();
        assert!(anomaly.value.is_finite());
        // A spread below 3 * epsilon stays quiet.
        assert!(check_volatility(&ranged(1.0, 1.0, 1.0), &flat, &config, Utc::now()).is_none());
    }

    #[test]
    fn test_large_transaction_uses_absolute_amount() {
        let now = Utc::now();
        let outgoing = test_transaction("SOL", -1500, TxStatus::Success, now);
        let anomaly = check_large_transaction(&outgoing, 1000.0, now).unwrap();
        assert_eq!(anomaly.severity, Severity::Warning);
        assert_eq!(anomaly.value, 1500.0);

        let exact = test_transaction("SOL", 1000, TxStatus::Success, now);
        assert!(check_large_transaction(&exact, 1000.0, now).is_none());
    }

    #[test]
    fn test_failed_transaction() {
        let now = Utc::now();
        let failed = test_transaction("SOL", 1, TxStatus::Failed, now);
        assert_eq!(
            check_failed_transaction(&failed, now).map(|a| a.severity),
            Some(Severity::Critical)
        );
        let ok = test_transaction("SOL", 1, TxStatus::Success, now);
        assert!(check_failed_transaction(&ok, now).is_none());
    }

    #[test]
    fn test_activity_burst_threshold() {
        let now = Utc::now();
        let tx = test_transaction("SOL", 1, TxStatus::Success, now);
        assert!(check_activity_burst(&tx, 3, 3, now).is_none());
        let anomaly = check_activity_burst(&tx, 4, 3, now).unwrap();
        assert_eq!(anomaly.severity, Severity::Info);
        assert_eq!(anomaly.value, 4.0);
    }
}
