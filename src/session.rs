use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::PatternConfig;
use crate::pattern::{detect_patterns, Pattern, PatternType};
use crate::stats::{transaction_stats, TransactionStats};
use crate::stream::types::TransactionEvent;

/// Everything the operator sees about the wallet session, derived from one
/// history snapshot. Same snapshot and `now` always give the same summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub stats: TransactionStats,
    pub patterns: Vec<Pattern>,
    /// Signed sum of amounts per token across the retained history.
    pub net_flows: BTreeMap<String, BigDecimal>,
    pub last_activity: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn from_history(
        history: &[TransactionEvent],
        now: DateTime<Utc>,
        config: &PatternConfig,
    ) -> Self {
        Self {
            stats: transaction_stats(history),
            patterns: detect_patterns(history, now, config),
            net_flows: net_flows(history),
            last_activity: history.iter().map(|tx| tx.timestamp).max(),
            computed_at: now,
        }
    }

    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            stats: TransactionStats::default(),
            patterns: Vec::new(),
            net_flows: BTreeMap::new(),
            last_activity: None,
            computed_at: now,
        }
    }

    pub fn has_pattern(&self, kind: PatternType) -> bool {
        self.patterns.iter().any(|p| p.kind == kind)
    }
}

pub fn net_flows(history: &[TransactionEvent]) -> BTreeMap<String, BigDecimal> {
    let mut flows: BTreeMap<String, BigDecimal> = BTreeMap::new();
    for tx in history {
        *flows
            .entry(tx.token.clone())
            .or_insert_with(|| BigDecimal::from(0)) += &tx.amount;
    }
    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::types::{test_transaction, TxStatus};
    use chrono::Duration;

    #[test]
    fn test_summary_is_idempotent() {
        let now = Utc::now();
        let history: Vec<TransactionEvent> = (0..6)
            .map(|i| test_transaction("SOL", i, TxStatus::Success, now - Duration::seconds(i)))
            .collect();
        let config = PatternConfig::default();

        let first = SessionSummary::from_history(&history, now, &config);
        let second = SessionSummary::from_history(&history, now, &config);
        assert_eq!(first, second);
        assert!(first.has_pattern(PatternType::ActivityBurst));
        assert!(first.has_pattern(PatternType::TokenConcentration));
        assert_eq!(first.last_activity, Some(now));
    }

    #[test]
    fn test_net_flows_are_signed() {
        let now = Utc::now();
        let history = vec![
            test_transaction("SOL", 10, TxStatus::Success, now),
            test_transaction("SOL", -4, TxStatus::Success, now),
            test_transaction("USDC", -7, TxStatus::Failed, now),
        ];
        let flows = net_flows(&history);
        assert_eq!(flows.get("SOL"), Some(&BigDecimal::from(6)));
        assert_eq!(flows.get("USDC"), Some(&BigDecimal::from(-7)));
    }

    #[test]
    fn test_empty_history() {
        let now = Utc::now();
        let summary = SessionSummary::from_history(&[], now, &PatternConfig::default());
        assert_eq!(summary, SessionSummary::empty(now));
    }
}
