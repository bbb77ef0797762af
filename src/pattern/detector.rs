use chrono::{DateTime, Utc};

use crate::anomaly::types::Severity;
use crate::config::PatternConfig;
use crate::stats::round_to;
use crate::stream::types::{TransactionEvent, TxStatus};

use super::types::{Pattern, PatternData, PatternType};

/// Transactions with `now - timestamp < window_ms`. Future-dated events
/// count as in-window.
pub fn in_window<'a>(
    history: &'a [TransactionEvent],
    now: DateTime<Utc>,
    window_ms: u64,
) -> Vec<&'a TransactionEvent> {
    let window_ms = i64::try_from(window_ms).unwrap_or(i64::MAX);
    history
        .iter()
        .filter(|tx| (now - tx.timestamp).num_milliseconds() < window_ms)
        .collect()
}

/// Evaluate burst, failure-rate and token-concentration patterns over the
/// recent slice of `history`.
pub fn detect_patterns(
    history: &[TransactionEvent],
    now: DateTime<Utc>,
    config: &PatternConfig,
) -> Vec<Pattern> {
    let recent = in_window(history, now, config.window_ms);
    let mut patterns = Vec::new();

    if let Some(pattern) = check_burst(&recent, config) {
        patterns.push(pattern);
    }
    if let Some(pattern) = check_failure_rate(&recent, config) {
        patterns.push(pattern);
    }
    if let Some(pattern) = check_token_concentration(&recent, config) {
        patterns.push(pattern);
    }

    patterns
}

fn check_burst(recent: &[&TransactionEvent], config: &PatternConfig) -> Option<Pattern> {
    let count = recent.len();
    if count <= config.burst_threshold {
        return None;
    }

    Some(Pattern {
        kind: PatternType::ActivityBurst,
        severity: Severity::Info,
        description: format!(
            "{} transactions in the last {}s",
            count,
            config.window_ms / 1000
        ),
        data: PatternData::Burst {
            count,
            window_ms: config.window_ms,
        },
    })
}

fn check_failure_rate(recent: &[&TransactionEvent], config: &PatternConfig) -> Option<Pattern> {
    if recent.is_empty() {
        return None;
    }

    let failed = recent
        .iter()
        .filter(|tx| tx.status == TxStatus::Failed)
        .count();
    let share = failed as f64 / recent.len() as f64;
    if share <= config.failure_threshold {
        return None;
    }

    Some(Pattern {
        kind: PatternType::HighFailureRate,
        severity: Severity::Warning,
        description: format!("{:.1}% transaction failure rate", share * 100.0),
        data: PatternData::FailureRate {
            failed_count: failed,
            total_count: recent.len(),
            rate: round_to(share * 100.0, 1),
        },
    })
}

fn check_token_concentration(
    recent: &[&TransactionEvent],
    config: &PatternConfig,
) -> Option<Pattern> {
    if recent.len() <= config.concentration_min_transactions {
        return None;
    }

    // Insertion-ordered tally so ties go to the token seen first.
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for tx in recent {
        match counts.iter_mut().find(|(token, _)| *token == tx.token) {
            Some((_, n)) => *n += 1,
            None => counts.push((tx.token.as_str(), 1)),
        }
    }

    let max = counts.iter().map(|(_, n)| *n).max()?;
    let (token, _) = counts.iter().find(|(_, n)| *n == max)?;
    let share = max as f64 / recent.len() as f64;
    if share <= config.concentration_share {
        return None;
    }

    Some(Pattern {
        kind: PatternType::TokenConcentration,
        severity: Severity::Info,
        description: format!("{} accounts for {:.0}% of activity", token, share * 100.0),
        data: PatternData::Concentration {
            token: token.to_string(),
            percentage: round_to(share * 100.0, 1),
        },
    })
}
