use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::str::FromStr;

use super::raw::{CandleBatch, RawCandle, RawTransaction};
use super::types::{Candle, TokenInfo, TransactionEvent, TxKind, TxStatus, UNKNOWN_SYMBOL};

/// Normalize a raw wallet activity payload. Missing or unparseable numeric
/// fields become zero; a missing timestamp becomes `now`.
pub fn normalize_transaction(raw: &RawTransaction, now: DateTime<Utc>) -> TransactionEvent {
    let body = raw.body();

    TransactionEvent {
        hash: pick(body, &["tx_hash", "hash"])
            .map(value_to_string)
            .unwrap_or_default(),
        kind: pick(body, &["tx_type", "type"])
            .map(|v| TxKind::parse(&value_to_string(v)))
            .unwrap_or(TxKind::Transfer),
        token: pick(body, &["token_symbol", "symbol"])
            .map(value_to_string)
            .unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
        amount: pick(body, &["value_change", "amount"])
            .map(value_to_decimal)
            .unwrap_or_else(zero),
        status: pick(body, &["status"])
            .map(|v| TxStatus::parse(&value_to_string(v)))
            .unwrap_or(TxStatus::Pending),
        timestamp: pick(body, &["timestamp"])
            .and_then(value_to_timestamp)
            .unwrap_or(now),
        from: pick(body, &["from_address"])
            .map(value_to_string)
            .unwrap_or_default(),
        to: pick(body, &["to_address"])
            .map(value_to_string)
            .unwrap_or_default(),
        fee: pick(body, &["transaction_fee", "fee_amount"])
            .map(value_to_decimal)
            .unwrap_or_else(zero),
    }
}

/// Normalize every candle in a delivery, in delivery order.
pub fn normalize_batch(batch: &CandleBatch, now: DateTime<Utc>) -> Vec<Candle> {
    batch
        .candles
        .iter()
        .map(|raw| normalize_candle(raw, &batch.subscribed_token, now))
        .collect()
}

pub fn normalize_candle(raw: &RawCandle, subscribed_token: &str, now: DateTime<Utc>) -> Candle {
    let body = &raw.0;
    let number = |key: &str| body.get(key).map(value_to_f64).unwrap_or(0.0);

    Candle {
        token: normalize_token(body.get("base_token"), subscribed_token),
        timestamp: pick(body, &["timestamp"])
            .and_then(value_to_timestamp)
            .unwrap_or(now),
        open: number("open"),
        high: number("high"),
        low: number("low"),
        close: number("close"),
        volume: number("volume"),
        volume_usd: number("volume_usd"),
        quote_rate: number("quote_rate"),
        quote_rate_usd: number("quote_rate_usd"),
    }
}

fn normalize_token(base_token: Option<&JsonValue>, subscribed_token: &str) -> TokenInfo {
    let token = base_token.filter(|v| v.is_object());
    let field = |key: &str| token.and_then(|t| pick(t, &[key])).map(value_to_string);

    TokenInfo {
        address: field("contract_address").unwrap_or_else(|| subscribed_token.to_string()),
        symbol: field("contract_ticker_symbol").unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
        name: field("contract_name").unwrap_or_else(|| "Unknown".to_string()),
        decimals: token
            .and_then(|t| t.get("contract_decimals"))
            .map(value_to_f64)
            .filter(|d| (0.0..=255.0).contains(d))
            .map(|d| d as u8)
            .unwrap_or(0),
    }
}

/// First key whose value is present, non-null and not an empty string.
fn pick<'a>(body: &'a JsonValue, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter().filter_map(|key| body.get(*key)).find(|v| match v {
        JsonValue::Null => false,
        JsonValue::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_f64(value: &JsonValue) -> f64 {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Largest exponent magnitude accepted for an amount. Anything beyond this
/// is coerced to zero, since aligning scales with it later would build huge
/// integers on every aggregate.
const MAX_DECIMAL_SCALE: i64 = 64;

fn value_to_decimal(value: &JsonValue) -> BigDecimal {
    let parsed = match value {
        JsonValue::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        JsonValue::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed
        .filter(|d| d.as_bigint_and_exponent().1.abs() <= MAX_DECIMAL_SCALE)
        .unwrap_or_else(zero)
}

/// RFC 3339 strings, or epoch numbers. Numbers below 1e11 are taken as
/// seconds, anything larger as milliseconds.
fn value_to_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            s.parse::<f64>().ok().and_then(epoch_to_timestamp)
        }
        JsonValue::Number(n) => n.as_f64().and_then(epoch_to_timestamp),
        _ => None,
    }
}

fn epoch_to_timestamp(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let millis = if epoch < 1e11 { epoch * 1000.0 } else { epoch };
    DateTime::from_timestamp_millis(millis as i64)
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}
