use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction/category of a wallet transaction as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Send,
    Receive,
    Swap,
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Swap => "swap",
            Self::Transfer => "transfer",
        }
    }

    /// Unrecognized kinds fall back to `Transfer`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "send" => Self::Send,
            "receive" => Self::Receive,
            "swap" => Self::Swap,
            _ => Self::Transfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Unrecognized statuses fall back to `Pending`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A normalized wallet transaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionEvent {
    pub hash: String,
    pub kind: TxKind,
    pub token: String,
    /// Signed balance change in token units.
    pub amount: BigDecimal,
    pub status: TxStatus,
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub fee: BigDecimal,
}

impl TransactionEvent {
    pub fn abs_amount(&self) -> BigDecimal {
        self.amount.abs()
    }

    pub fn abs_amount_f64(&self) -> f64 {
        self.amount.abs().to_f64().unwrap_or(0.0)
    }
}

/// Symbol recorded when a payload does not name its token.
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

/// Identity of the base token a candle prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl TokenInfo {
    /// False for placeholder identities built from the subscribed address alone.
    pub fn is_identified(&self) -> bool {
        self.symbol != UNKNOWN_SYMBOL
    }
}

/// One OHLCV bucket for a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub token: TokenInfo,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub volume_usd: f64,
    pub quote_rate: f64,
    pub quote_rate_usd: f64,
}

impl Candle {
    /// Candles without a positive close are kept in history but never enter
    /// price statistics.
    pub fn has_valid_close(&self) -> bool {
        self.close > 0.0
    }

    pub fn spread(&self) -> f64 {
        self.high - self.low
    }
}

/// Candle with only the fields the statistics care about filled in.
#[cfg(test)]
pub fn test_candle(token: &str, close: f64, volume: f64) -> Candle {
    Candle {
        token: TokenInfo {
            address: token.to_string(),
            symbol: token.to_string(),
            name: token.to_string(),
            decimals: 9,
        },
        timestamp: Utc::now(),
        open: close,
        high: close,
        low: close,
        close,
        volume,
        volume_usd: 0.0,
        quote_rate: 0.0,
        quote_rate_usd: 0.0,
    }
}

#[cfg(test)]
pub fn test_transaction(
    token: &str,
    amount: i64,
    status: TxStatus,
    timestamp: DateTime<Utc>,
) -> TransactionEvent {
    TransactionEvent {
        hash: format!("{}-{}-{}", token, amount, timestamp.timestamp_millis()),
        kind: if amount < 0 { TxKind::Send } else { TxKind::Receive },
        token: token.to_string(),
        amount: BigDecimal::from(amount),
        status,
        timestamp,
        from: String::new(),
        to: String::new(),
        fee: BigDecimal::from(0),
    }
}
