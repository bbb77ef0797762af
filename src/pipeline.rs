use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::anomaly::{Anomaly, AnomalyClassifier, SharedFeed};
use crate::config::Config;
use crate::history::{BoundedBuffer, CandleHistory};
use crate::pattern::{in_window, PatternType};
use crate::session::SessionSummary;
use crate::stats::{candle_summary, CandleSummary};
use crate::stream::normalize::normalize_batch;
use crate::stream::raw::CandleBatch;
use crate::stream::types::{Candle, TransactionEvent};

/// Liveness record for one stream, as shown to the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamHealth {
    pub is_connected: bool,
    /// Deliveries processed, including empty candle batches.
    pub data_count: u64,
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Candles whose timestamp went backwards relative to the previous one.
    pub out_of_order: u64,
}

impl StreamHealth {
    fn record_delivery(&mut self, now: DateTime<Utc>) {
        self.data_count += 1;
        self.last_update_time = Some(now);
    }
}

/// Result of processing one delivery.
#[derive(Debug, Default)]
pub struct ProcessResult {
    pub anomalies: Vec<Anomaly>,
    pub evicted: usize,
}

// ============================================================
// Transaction stream
// ============================================================

/// Immutable snapshot of the wallet stream published after every event.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
    /// Oldest to newest.
    pub transactions: Vec<TransactionEvent>,
    pub summary: SessionSummary,
    pub health: StreamHealth,
}

/// Sole owner and writer of the transaction history.
pub struct TransactionPipeline {
    history: BoundedBuffer<TransactionEvent>,
    classifier: AnomalyClassifier,
    config: Config,
    feed: SharedFeed,
    health: StreamHealth,
    active_patterns: HashSet<PatternType>,
    publisher: watch::Sender<Arc<TransactionView>>,
}

impl TransactionPipeline {
    pub fn new(config: &Config, feed: SharedFeed) -> (Self, watch::Receiver<Arc<TransactionView>>) {
        let initial = Arc::new(TransactionView {
            transactions: Vec::new(),
            summary: SessionSummary::empty(Utc::now()),
            health: StreamHealth::default(),
        });
        let (publisher, receiver) = watch::channel(initial);

        let pipeline = Self {
            history: BoundedBuffer::new(config.history.transaction_capacity),
            classifier: AnomalyClassifier::new(
                config.candle_rules.clone(),
                config.transaction_rules.clone(),
            ),
            config: config.clone(),
            feed,
            health: StreamHealth::default(),
            active_patterns: HashSet::new(),
            publisher,
        };
        (pipeline, receiver)
    }

    /// Append, classify, re-aggregate and publish, in that order.
    pub fn process(&mut self, tx: TransactionEvent, now: DateTime<Utc>) -> eyre::Result<ProcessResult> {
        self.health.record_delivery(now);

        let evicted = usize::from(self.history.push(tx.clone()).is_some());
        let snapshot = self.history.snapshot();

        let recent_count = in_window(&snapshot, now, self.config.patterns.window_ms).len();
        let mut anomalies = self.classifier.classify_transaction(&tx, recent_count, now);

        let summary = SessionSummary::from_history(&snapshot, now, &self.config.patterns);
        anomalies.extend(self.newly_active_patterns(&summary, now));

        for anomaly in &anomalies {
            tracing::warn!(
                kind = anomaly.kind.as_str(),
                severity = anomaly.severity.as_str(),
                subject = %anomaly.subject,
                value = %anomaly.display_value(),
                "ANOMALY DETECTED"
            );
        }
        self.feed.publish(&anomalies)?;

        tracing::debug!(
            hash = %tx.hash,
            kind = tx.kind.as_str(),
            token = %tx.token,
            recent_count,
            anomalies = anomalies.len(),
            "Transaction processed"
        );

        self.publish(snapshot, summary);
        Ok(ProcessResult { anomalies, evicted })
    }

    /// Patterns present now but absent in the previous summary become feed
    /// entries, when merging is enabled.
    fn newly_active_patterns(&mut self, summary: &SessionSummary, now: DateTime<Utc>) -> Vec<Anomaly> {
        let current: HashSet<PatternType> = summary.patterns.iter().map(|p| p.kind).collect();
        let merged = if self.config.patterns.merge_into_feed {
            summary
                .patterns
                .iter()
                .filter(|p| !self.active_patterns.contains(&p.kind))
                .map(|p| p.to_anomaly(now))
                .collect()
        } else {
            Vec::new()
        };
        self.active_patterns = current;
        merged
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.health.is_connected = connected;
        self.republish_health();
    }

    pub fn record_error(&mut self, error: String) {
        self.health.last_error = Some(error);
        self.republish_health();
    }

    pub fn health(&self) -> &StreamHealth {
        &self.health
    }

    pub fn snapshot(&self) -> Vec<TransactionEvent> {
        self.history.snapshot()
    }

    fn publish(&self, transactions: Vec<TransactionEvent>, summary: SessionSummary) {
        let view = TransactionView {
            transactions,
            summary,
            health: self.health.clone(),
        };
        // No receivers left just means nobody is watching.
        let _ = self.publisher.send(Arc::new(view));
    }

    fn republish_health(&self) {
        let health = self.health.clone();
        self.publisher.send_modify(|view| {
            let mut updated = (**view).clone();
            updated.health = health;
            *view = Arc::new(updated);
        });
    }
}

// ============================================================
// Candle stream
// ============================================================

/// Immutable snapshot of every token's candle stream.
#[derive(Debug, Clone, Serialize)]
pub struct CandleView {
    /// Token address → candles, oldest to newest.
    pub candles: BTreeMap<String, Vec<Candle>>,
    pub summaries: BTreeMap<String, CandleSummary>,
    pub health: StreamHealth,
}

/// Sole owner and writer of the per-token candle histories.
pub struct CandlePipeline {
    history: CandleHistory,
    classifier: AnomalyClassifier,
    feed: SharedFeed,
    health: StreamHealth,
    publisher: watch::Sender<Arc<CandleView>>,
}

impl CandlePipeline {
    pub fn new(config: &Config, feed: SharedFeed) -> (Self, watch::Receiver<Arc<CandleView>>) {
        let initial = Arc::new(CandleView {
            candles: BTreeMap::new(),
            summaries: BTreeMap::new(),
            health: StreamHealth::default(),
        });
        let (publisher, receiver) = watch::channel(initial);

        let pipeline = Self {
            history: CandleHistory::new(config.history.candle_capacity),
            classifier: AnomalyClassifier::new(
                config.candle_rules.clone(),
                config.transaction_rules.clone(),
            ),
            feed,
            health: StreamHealth::default(),
            publisher,
        };
        (pipeline, receiver)
    }

    /// Normalize one upstream delivery and process it.
    pub fn process_batch(&mut self, batch: &CandleBatch, now: DateTime<Utc>) -> eyre::Result<ProcessResult> {
        self.process_candles(normalize_batch(batch, now), now)
    }

    /// Process candles in arrival order. An empty batch is a normal quiet
    /// period: it only bumps the delivery counters.
    pub fn process_candles(&mut self, candles: Vec<Candle>, now: DateTime<Utc>) -> eyre::Result<ProcessResult> {
        let mut result = ProcessResult::default();

        if candles.is_empty() {
            self.health.record_delivery(now);
            tracing::debug!("Empty OHLCV batch, waiting for trading activity");
            self.publish();
            return Ok(result);
        }

        for mut candle in candles {
            self.health.record_delivery(now);
            self.history.resolve_identity(&mut candle.token);

            let token = candle.token.address.clone();
            if let Some(previous) = self.history.latest(&token) {
                if candle.timestamp < previous.timestamp {
                    self.health.out_of_order += 1;
                    tracing::debug!(
                        token = %token,
                        previous = %previous.timestamp,
                        current = %candle.timestamp,
                        "Candle arrived out of order, keeping arrival order"
                    );
                }
            }

            let prior = self.history.snapshot(&token);
            let anomalies = self.classifier.classify_candle(&candle, &prior, now);
            if self.history.append(candle).is_some() {
                result.evicted += 1;
            }

            for anomaly in &anomalies {
                tracing::warn!(
                    kind = anomaly.kind.as_str(),
                    severity = anomaly.severity.as_str(),
                    token = %anomaly.subject,
                    value = %anomaly.display_value(),
                    "ANOMALY DETECTED"
                );
            }
            self.feed.publish(&anomalies)?;
            result.anomalies.extend(anomalies);
        }

        self.publish();
        Ok(result)
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.health.is_connected = connected;
        self.publish();
    }

    pub fn record_error(&mut self, error: String) {
        self.health.last_error = Some(error);
        self.publish();
    }

    pub fn health(&self) -> &StreamHealth {
        &self.health
    }

    pub fn snapshot(&self, token: &str) -> Vec<Candle> {
        self.history.snapshot(token)
    }

    fn publish(&self) {
        let candles = self.history.snapshot_all();
        let summaries = candles
            .iter()
            .map(|(token, history)| (token.clone(), candle_summary(history)))
            .collect();
        let view = CandleView {
            candles,
            summaries,
            health: self.health.clone(),
        };
        let _ = self.publisher.send(Arc::new(view));
    }
}
