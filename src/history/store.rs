use std::collections::{BTreeMap, HashMap};

use crate::stream::types::{Candle, TokenInfo};

use super::buffer::BoundedBuffer;

/// Per-token candle history. Each token gets its own bounded buffer, created
/// lazily when the first candle for that token arrives.
///
/// The first full identity seen for an address is kept for the life of the
/// history, since later candles often arrive without their `base_token`.
#[derive(Debug, Clone)]
pub struct CandleHistory {
    per_token: HashMap<String, BoundedBuffer<Candle>>,
    identities: HashMap<String, TokenInfo>,
    capacity: usize,
}

impl CandleHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            per_token: HashMap::new(),
            identities: HashMap::new(),
            capacity,
        }
    }

    /// Append a candle to its token's buffer, returning any evicted candle.
    pub fn append(&mut self, candle: Candle) -> Option<Candle> {
        let capacity = self.capacity;
        self.per_token
            .entry(candle.token.address.clone())
            .or_insert_with(|| BoundedBuffer::new(capacity))
            .push(candle)
    }

    /// Fill a placeholder token identity from the first identified candle for
    /// the same address, or remember this one if it is the first.
    pub fn resolve_identity(&mut self, token: &mut TokenInfo) {
        if token.is_identified() {
            self.identities
                .entry(token.address.clone())
                .or_insert_with(|| token.clone());
        } else if let Some(known) = self.identities.get(&token.address) {
            *token = known.clone();
        }
    }

    pub fn identity(&self, token: &str) -> Option<&TokenInfo> {
        self.identities.get(token)
    }

    /// Oldest to newest. Empty for an unknown token.
    pub fn snapshot(&self, token: &str) -> Vec<Candle> {
        self.per_token
            .get(token)
            .map(BoundedBuffer::snapshot)
            .unwrap_or_default()
    }

    pub fn latest(&self, token: &str) -> Option<&Candle> {
        self.per_token.get(token).and_then(BoundedBuffer::latest)
    }

    pub fn snapshot_all(&self) -> BTreeMap<String, Vec<Candle>> {
        self.per_token
            .iter()
            .map(|(token, buf)| (token.clone(), buf.snapshot()))
            .collect()
    }

    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.per_token.keys().cloned().collect();
        tokens.sort();
        tokens
    }

    pub fn len(&self, token: &str) -> usize {
        self.per_token.get(token).map_or(0, BoundedBuffer::len)
    }
}
