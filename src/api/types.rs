use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::anomaly::Anomaly;
use crate::pipeline::StreamHealth;
use crate::stats::{CandleSummary, TransactionStats};
use crate::pattern::Pattern;
use crate::stream::types::{Candle, TokenInfo, TransactionEvent};

// ============================================================
// Query params
// ============================================================

#[derive(Debug, Default, Deserialize)]
pub struct TransactionParams {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub token: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// RFC3339, inclusive.
    pub since: Option<String>,
    /// RFC3339, inclusive.
    pub until: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnomalyParams {
    pub min_severity: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

// ============================================================
// Response types
// ============================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub transactions: StreamHealth,
    pub candles: StreamHealth,
    pub anomalies_published: u64,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    /// Newest first.
    pub transactions: Vec<TransactionEvent>,
    /// Matches before the limit was applied.
    pub total: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub stats: TransactionStats,
    pub patterns: Vec<Pattern>,
    pub last_activity: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    /// Net signed flow per token over the retained history.
    pub balances: BTreeMap<String, BigDecimal>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AnomaliesResponse {
    pub anomalies: Vec<Anomaly>,
    pub total: usize,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct TokenCandleEntry {
    pub token: TokenInfo,
    pub latest: Option<Candle>,
    pub summary: CandleSummary,
}

#[derive(Debug, Serialize)]
pub struct CandleTokensResponse {
    pub tokens: Vec<TokenCandleEntry>,
}

#[derive(Debug, Serialize)]
pub struct CandleHistoryResponse {
    pub token: TokenInfo,
    /// Oldest first.
    pub candles: Vec<Candle>,
    pub summary: CandleSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
