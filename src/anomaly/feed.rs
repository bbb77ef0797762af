use std::sync::{Arc, Mutex};

use crate::history::BoundedBuffer;

use super::types::{Anomaly, AnomalyType, Severity};

/// Capped list of recent anomalies. Newest entries sit at the head; once
/// the cap is reached the oldest entry falls off the tail.
#[derive(Debug, Clone)]
pub struct AnomalyFeed {
    entries: BoundedBuffer<Anomaly>,
    total_published: u64,
}

impl AnomalyFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoundedBuffer::new(capacity),
            total_published: 0,
        }
    }

    /// Insert at the head. Returns whatever was evicted from the tail.
    pub fn push(&mut self, anomaly: Anomaly) -> Option<Anomaly> {
        self.total_published += 1;
        self.entries.push(anomaly)
    }

    /// Insert a batch in order; the last one ends up at the head.
    pub fn extend(&mut self, anomalies: impl IntoIterator<Item = Anomaly>) -> usize {
        anomalies
            .into_iter()
            .filter_map(|anomaly| self.push(anomaly))
            .count()
    }

    /// Newest first.
    pub fn snapshot(&self) -> Vec<Anomaly> {
        self.entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_published(&self) -> u64 {
        self.total_published
    }
}

/// Newest-first view filtered by minimum severity and kind.
pub fn filter_anomalies(
    anomalies: &[Anomaly],
    min_severity: Option<Severity>,
    kind: Option<AnomalyType>,
    limit: usize,
) -> Vec<Anomaly> {
    anomalies
        .iter()
        .filter(|a| min_severity.map_or(true, |min| a.severity >= min))
        .filter(|a| kind.map_or(true, |k| a.kind == k))
        .take(limit)
        .cloned()
        .collect()
}

/// The feed both stream pipelines publish into. Each call takes the lock
/// once, so a batch from one event lands atomically.
#[derive(Debug, Clone)]
pub struct SharedFeed {
    inner: Arc<Mutex<AnomalyFeed>>,
}

impl SharedFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AnomalyFeed::new(capacity))),
        }
    }

    pub fn publish(&self, anomalies: &[Anomaly]) -> eyre::Result<()> {
        if anomalies.is_empty() {
            return Ok(());
        }
        let mut feed = self
            .inner
            .lock()
            .map_err(|_| eyre::eyre!("Anomaly feed lock poisoned"))?;
        let evicted = feed.extend(anomalies.iter().cloned());
        if evicted > 0 {
            tracing::debug!(evicted, "Anomaly feed at capacity");
        }
        Ok(())
    }

    pub fn snapshot(&self) -> eyre::Result<Vec<Anomaly>> {
        let feed = self
            .inner
            .lock()
            .map_err(|_| eyre::eyre!("Anomaly feed lock poisoned"))?;
        Ok(feed.snapshot())
    }

    pub fn total_published(&self) -> eyre::Result<u64> {
        let feed = self
            .inner
            .lock()
            .map_err(|_| eyre::eyre!("Anomaly feed lock poisoned"))?;
        Ok(feed.total_published())
    }
}
