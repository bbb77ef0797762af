use bigdecimal::BigDecimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::stream::types::{TransactionEvent, TxKind, TxStatus};

use super::round_to;

/// Session-level aggregates over the transaction history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStats {
    pub total_transactions: usize,
    /// Percentage, rounded to two decimals.
    pub success_rate: f64,
    /// Percentage, rounded to two decimals.
    pub failure_rate: f64,
    /// Mean absolute amount, rounded to four decimals.
    pub average_amount: BigDecimal,
    /// Sum of absolute amounts, rounded to four decimals.
    pub total_volume: BigDecimal,
    pub by_kind: BTreeMap<TxKind, usize>,
}

impl Default for TransactionStats {
    fn default() -> Self {
        Self {
            total_transactions: 0,
            success_rate: 0.0,
            failure_rate: 0.0,
            average_amount: BigDecimal::from(0),
            total_volume: BigDecimal::from(0),
            by_kind: BTreeMap::new(),
        }
    }
}

pub fn transaction_stats(history: &[TransactionEvent]) -> TransactionStats {
    if history.is_empty() {
        return TransactionStats::default();
    }

    let total = history.len();
    let succeeded = history.iter().filter(|tx| tx.status == TxStatus::Success).count();
    let failed = history.iter().filter(|tx| tx.status == TxStatus::Failed).count();

    let mut by_kind = BTreeMap::new();
    for tx in history {
        *by_kind.entry(tx.kind).or_insert(0) += 1;
    }

    let total_volume: BigDecimal = history.iter().map(TransactionEvent::abs_amount).sum();
    let average_amount = &total_volume / BigDecimal::from(total as u64);

    TransactionStats {
        total_transactions: total,
        success_rate: percentage(succeeded, total),
        failure_rate: percentage(failed, total),
        average_amount: average_amount.round(4),
        total_volume: total_volume.round(4),
        by_kind,
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    round_to(part as f64 / total as f64 * 100.0, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::types::test_transaction;
    use chrono::Utc;
    use std::str::FromStr;

    #[test]
    fn test_empty_history_all_zero() {
        let stats = transaction_stats(&[]);
        assert_eq!(stats.total_transactions, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.failure_rate, 0.0);
        assert!(!stats.success_rate.is_nan());
        assert_eq!(stats.average_amount, BigDecimal::from(0));
        assert_eq!(stats.total_volume, BigDecimal::from(0));
        assert!(stats.by_kind.is_empty());
    }

    #[test]
    fn test_rates_and_volume() {
        let now = Utc::now();
        let history = vec![
            test_transaction("SOL", -10, TxStatus::Success, now),
            test_transaction("SOL", 20, TxStatus::Success, now),
            test_transaction("USDC", 5, TxStatus::Failed, now),
        ];

        let stats = transaction_stats(&history);
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.success_rate, 66.67);
        assert_eq!(stats.failure_rate, 33.33);
        assert_eq!(stats.total_volume, BigDecimal::from(35));
        assert_eq!(stats.average_amount, BigDecimal::from_str("11.6667").unwrap());
        assert_eq!(stats.by_kind.get(&TxKind::Send), Some(&1));
        assert_eq!(stats.by_kind.get(&TxKind::Receive), Some(&2));
    }

    #[test]
    fn test_pending_counts_toward_neither_rate() {
        let now = Utc::now();
        let history = vec![
            test_transaction("SOL", 1, TxStatus::Pending, now),
            test_transaction("SOL", 1, TxStatus::Success, now),
        ];
        let stats = transaction_stats(&history);
        assert_eq!(stats.success_rate, 50.0);
        assert_eq!(stats.failure_rate, 0.0);
    }
}
