use chrono::{DateTime, Utc};

use crate::config::{CandleRulesConfig, TransactionRulesConfig};
use crate::stats::candle_stats;
use crate::stream::types::{Candle, TransactionEvent};

use super::rules;
use super::types::Anomaly;

/// The anomaly classifier. Runs every configured rule against a new data
/// point and the history that preceded it. Pure: no state beyond config.
#[derive(Debug, Clone, Default)]
pub struct AnomalyClassifier {
    candle_rules: CandleRulesConfig,
    transaction_rules: TransactionRulesConfig,
}

impl AnomalyClassifier {
    pub fn new(candle_rules: CandleRulesConfig, transaction_rules: TransactionRulesConfig) -> Self {
        Self {
            candle_rules,
            transaction_rules,
        }
    }

    /// Classify a candle against its token's prior history (which must not
    /// include the candle itself). Short or invalid history yields nothing.
    pub fn classify_candle(
        &self,
        candle: &Candle,
        prior: &[Candle],
        now: DateTime<Utc>,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        if prior.len() < self.candle_rules.min_history || !candle.has_valid_close() {
            return anomalies;
        }
        let Some(stats) = candle_stats(prior) else {
            return anomalies;
        };

        // Rule 1: Price spike
        if let Some(anomaly) = rules::check_price_spike(candle, &stats, &self.candle_rules, now) {
            anomalies.push(anomaly);
        }

        // Rule 2: Volume spike
        if let Some(anomaly) = rules::check_volume_spike(candle, &stats, &self.candle_rules, now) {
            anomalies.push(anomaly);
        }

        // Rule 3: Volatility against the most recent prior candle
        if let Some(previous) = prior.last() {
            if let Some(anomaly) = rules::check_volatility(candle, previous, &self.candle_rules, now)
            {
                anomalies.push(anomaly);
            }
        }

        anomalies
    }

    /// Classify a single wallet transaction. `recent_count` is the number of
    /// transactions the caller saw in its recent activity window.
    pub fn classify_transaction(
        &self,
        tx: &TransactionEvent,
        recent_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        // Rule 1: Large transaction
        if let Some(anomaly) = rules::check_large_transaction(
            tx,
            self.transaction_rules.large_transaction_threshold,
            now,
        ) {
            anomalies.push(anomaly);
        }

        // Rule 2: Failed transaction
        if let Some(anomaly) = rules::check_failed_transaction(tx, now) {
            anomalies.push(anomaly);
        }

        // Rule 3: Activity burst
        if let Some(anomaly) = rules::check_activity_burst(
            tx,
            recent_count,
            self.transaction_rules.activity_burst_threshold,
            now,
        ) {
            anomalies.push(anomaly);
        }

        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::types::{AnomalyType, Severity};
    use crate::stream::types::{test_candle, test_transaction, TxStatus};

    fn closes(values: &[f64]) -> Vec<Candle> {
        values.iter().map(|c| test_candle("SOL", *c, 100.0)).collect()
    }

    #[test]
    fn test_needs_three_prior_candles() {
        let classifier = AnomalyClassifier::default();
        let spike = test_candle("SOL", 10.0, 10_000.0);
        assert!(classifier.classify_candle(&spike, &closes(&[1.0, 1.0]), Utc::now()).is_empty());
    }

    #[test]
    fn test_flat_history_then_jump_is_critical() {
        let classifier = AnomalyClassifier::default();
        let candle = test_candle("SOL", 1.5, 100.0);
        let anomalies = classifier.classify_candle(&candle, &closes(&[1.0, 1.0, 1.0]), Utc::now());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyType::PriceSpike);
        assert_eq!(anomalies[0].severity, Severity::Critical);
        assert!((anomalies[0].value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_candle_rules_can_fire_together() {
        let classifier = AnomalyClassifier::default();
        let prior = closes(&[1.0, 1.0, 1.0]);
        let candle = Candle {
            high: 2.5,
            low: 1.5,
            ..test_candle("SOL", 2.0, 1_000.0)
        };
        let kinds: Vec<AnomalyType> = classifier
            .classify_candle(&candle, &prior, Utc::now())
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AnomalyType::PriceSpike,
                AnomalyType::VolumeSpike,
                AnomalyType::HighVolatility
            ]
        );
    }

    #[test]
    fn test_invalid_close_yields_nothing() {
        let classifier = AnomalyClassifier::default();
        let candle = test_candle("SOL", 0.0, 10_000.0);
        assert!(classifier
            .classify_candle(&candle, &closes(&[1.0, 1.0, 1.0]), Utc::now())
            .is_empty());
    }

    #[test]
    fn test_prior_with_too_few_valid_closes() {
        let classifier = AnomalyClassifier::default();
        let candle = test_candle("SOL", 5.0, 100.0);
        assert!(classifier
            .classify_candle(&candle, &closes(&[0.0, 0.0, 1.0]), Utc::now())
            .is_empty());
    }

    #[test]
    fn test_transaction_rules_independent() {
        let classifier = AnomalyClassifier::default();
        let now = Utc::now();
        let tx = test_transaction("SOL", -5000, TxStatus::Failed, now);
        let kinds: Vec<AnomalyType> = classifier
            .classify_transaction(&tx, 4, now)
            .iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AnomalyType::LargeTransaction,
                AnomalyType::FailedTransaction,
                AnomalyType::ActivityBurst
            ]
        );

        let quiet = test_transaction("SOL", 10, TxStatus::Success, now);
        assert!(classifier.classify_transaction(&quiet, 1, now).is_empty());
    }
}
