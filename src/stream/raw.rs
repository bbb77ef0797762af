use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A wallet activity payload exactly as the connector delivered it. Field
/// names vary between provider versions, so lookups happen at normalization
/// time rather than through a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTransaction(pub JsonValue);

/// A single candle object as delivered by the connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCandle(pub JsonValue);

/// One OHLCV delivery: zero or more candles for a subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleBatch {
    /// Token the subscription was opened for. Used when a candle does not
    /// carry its own base token address.
    pub subscribed_token: String,
    pub candles: Vec<RawCandle>,
}

impl RawTransaction {
    /// The provider sometimes wraps the record as `{ "data": { .. } }`.
    pub fn body(&self) -> &JsonValue {
        match self.0.get("data") {
            Some(inner) if inner.is_object() => inner,
            _ => &self.0,
        }
    }
}

impl CandleBatch {
    pub fn from_payload(subscribed_token: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            subscribed_token: subscribed_token.into(),
            candles: parse_candle_payload(payload),
        }
    }
}

/// Extract candles from any of the delivery shapes the OHLCV stream emits:
///
/// - `{ "ohlcvCandlesForToken": [..] }` or a single object under that key
/// - `{ "data": { "ohlcvCandlesForToken": .. } }`
/// - a bare array of candles
/// - `{ "items": [..] }`
/// - a single candle object
///
/// `null` and empty arrays yield an empty batch.
pub fn parse_candle_payload(payload: JsonValue) -> Vec<RawCandle> {
    match payload {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items.into_iter().filter_map(into_candle).collect(),
        JsonValue::Object(mut map) => {
            if let Some(inner) = map.remove("ohlcvCandlesForToken") {
                return one_or_many(inner);
            }
            if let Some(JsonValue::Object(mut data)) = map.remove("data") {
                if let Some(inner) = data.remove("ohlcvCandlesForToken") {
                    return one_or_many(inner);
                }
                // `data` without the candle key: treat the wrapper itself as
                // the candle, as the provider does for single updates.
                return vec![RawCandle(JsonValue::Object(data))];
            }
            if let Some(JsonValue::Array(items)) = map.remove("items") {
                return items.into_iter().filter_map(into_candle).collect();
            }
            vec![RawCandle(JsonValue::Object(map))]
        }
        _ => Vec::new(),
    }
}

fn one_or_many(value: JsonValue) -> Vec<RawCandle> {
    match value {
        JsonValue::Array(items) => items.into_iter().filter_map(into_candle).collect(),
        other => into_candle(other).into_iter().collect(),
    }
}

fn into_candle(value: JsonValue) -> Option<RawCandle> {
    value.is_object().then_some(RawCandle(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_graphql_array_shape() {
        let payload = json!({ "ohlcvCandlesForToken": [{ "close": 1.0 }, { "close": 2.0 }] });
        assert_eq!(parse_candle_payload(payload).len(), 2);
    }

    #[test]
    fn test_graphql_single_object_shape() {
        let payload = json!({ "ohlcvCandlesForToken": { "close": 1.0 } });
        assert_eq!(parse_candle_payload(payload).len(), 1);
    }

    #[test]
    fn test_nested_data_shape() {
        let payload = json!({ "data": { "ohlcvCandlesForToken": [{ "close": 1.0 }] } });
        assert_eq!(parse_candle_payload(payload).len(), 1);
    }

    #[test]
    fn test_items_and_bare_array_shapes() {
        assert_eq!(parse_candle_payload(json!({ "items": [{ "close": 1.0 }] })).len(), 1);
        assert_eq!(parse_candle_payload(json!([{ "close": 1.0 }, { "close": 3.0 }])).len(), 2);
    }

    #[test]
    fn test_single_candle_object() {
        let candles = parse_candle_payload(json!({ "close": "1.25", "volume": 10 }));
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].0["close"], json!("1.25"));
    }

    #[test]
    fn test_empty_deliveries() {
        assert!(parse_candle_payload(JsonValue::Null).is_empty());
        assert!(parse_candle_payload(json!([])).is_empty());
        assert!(parse_candle_payload(json!({ "ohlcvCandlesForToken": [] })).is_empty());
    }

    #[test]
    fn test_transaction_body_unwraps_data() {
        let wrapped = RawTransaction(json!({ "data": { "tx_hash": "abc" } }));
        assert_eq!(wrapped.body()["tx_hash"], json!("abc"));

        let flat = RawTransaction(json!({ "tx_hash": "def" }));
        assert_eq!(flat.body()["tx_hash"], json!("def"));
    }
}
