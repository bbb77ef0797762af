use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use bigdecimal::{BigDecimal, FromPrimitive};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::anomaly::feed::filter_anomalies;
use crate::anomaly::{AnomalyType, Severity};
use crate::stats::candle_summary;
use crate::stream::types::{TransactionEvent, TxKind, TxStatus};

use super::types::*;
use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
type ApiError = (StatusCode, Json<ErrorResponse>);

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

fn internal(e: eyre::Report) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
}

// ============================================================
// Transaction filtering
// ============================================================

/// Parsed form of [`TransactionParams`]. Amount bounds compare against the
/// absolute amount so sends and receives filter alike.
#[derive(Debug, Default)]
pub struct TransactionFilter {
    pub kind: Option<TxKind>,
    pub status: Option<TxStatus>,
    pub token: Option<String>,
    pub min_amount: Option<BigDecimal>,
    pub max_amount: Option<BigDecimal>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn from_params(params: &TransactionParams) -> Result<Self, String> {
        let kind = params
            .kind
            .as_deref()
            .map(|k| match k.to_ascii_lowercase().as_str() {
                "send" => Ok(TxKind::Send),
                "receive" => Ok(TxKind::Receive),
                "swap" => Ok(TxKind::Swap),
                "transfer" => Ok(TxKind::Transfer),
                other => Err(format!("Unknown transaction kind: {}", other)),
            })
            .transpose()?;
        let status = params
            .status
            .as_deref()
            .map(|s| match s.to_ascii_lowercase().as_str() {
                "pending" => Ok(TxStatus::Pending),
                "success" => Ok(TxStatus::Success),
                "failed" => Ok(TxStatus::Failed),
                other => Err(format!("Unknown transaction status: {}", other)),
            })
            .transpose()?;

        Ok(Self {
            kind,
            status,
            token: params.token.clone(),
            min_amount: params.min_amount.map(parse_amount).transpose()?,
            max_amount: params.max_amount.map(parse_amount).transpose()?,
            since: params.since.as_deref().map(parse_time).transpose()?,
            until: params.until.as_deref().map(parse_time).transpose()?,
        })
    }

    pub fn matches(&self, tx: &TransactionEvent) -> bool {
        if self.kind.is_some_and(|k| tx.kind != k) {
            return false;
        }
        if self.status.is_some_and(|s| tx.status != s) {
            return false;
        }
        if self.token.as_ref().is_some_and(|t| !tx.token.eq_ignore_ascii_case(t)) {
            return false;
        }

        let amount = tx.abs_amount();
        if self.min_amount.as_ref().is_some_and(|min| amount < *min) {
            return false;
        }
        if self.max_amount.as_ref().is_some_and(|max| amount > *max) {
            return false;
        }

        if self.since.is_some_and(|since| tx.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| tx.timestamp > until) {
            return false;
        }
        true
    }
}

fn parse_amount(value: f64) -> Result<BigDecimal, String> {
    BigDecimal::from_f64(value).ok_or_else(|| format!("Invalid amount: {}", value))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp '{}': {}", value, e))
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let transactions = state.transactions.borrow().health.clone();
    let candles = state.candles.borrow().health.clone();
    let anomalies_published = state.feed.total_published().map_err(internal)?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        transactions,
        candles,
        anomalies_published,
    }))
}

// ============================================================
// Wallet session
// ============================================================

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionParams>,
) -> ApiResult<TransactionsResponse> {
    let filter = TransactionFilter::from_params(&params)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let limit = clamp_limit(params.limit);

    let view = state.transactions.borrow().clone();
    let matched: Vec<&TransactionEvent> = view
        .transactions
        .iter()
        .rev()
        .filter(|tx| filter.matches(tx))
        .collect();

    Ok(Json(TransactionsResponse {
        total: matched.len(),
        transactions: matched.into_iter().take(limit).cloned().collect(),
        limit,
    }))
}

pub async fn summary(State(state): State<Arc<AppState>>) -> ApiResult<SummaryResponse> {
    let view = state.transactions.borrow().clone();
    let summary = &view.summary;
    Ok(Json(SummaryResponse {
        stats: summary.stats.clone(),
        patterns: summary.patterns.clone(),
        last_activity: summary.last_activity,
        computed_at: summary.computed_at,
    }))
}

pub async fn balances(State(state): State<Arc<AppState>>) -> ApiResult<BalancesResponse> {
    let view = state.transactions.borrow().clone();
    Ok(Json(BalancesResponse {
        balances: view.summary.net_flows.clone(),
        last_activity: view.summary.last_activity,
    }))
}

// ============================================================
// Anomalies
// ============================================================

pub async fn list_anomalies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnomalyParams>,
) -> ApiResult<AnomaliesResponse> {
    let min_severity = params
        .min_severity
        .as_deref()
        .map(|s| {
            Severity::parse(s)
                .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Unknown severity: {}", s)))
        })
        .transpose()?;
    let kind = params
        .kind
        .as_deref()
        .map(|k| {
            AnomalyType::parse(k)
                .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Unknown anomaly kind: {}", k)))
        })
        .transpose()?;
    let limit = clamp_limit(params.limit);

    let feed = state.feed.snapshot().map_err(internal)?;
    let total = filter_anomalies(&feed, min_severity, kind, usize::MAX).len();
    let anomalies = filter_anomalies(&feed, min_severity, kind, limit);

    Ok(Json(AnomaliesResponse {
        anomalies,
        total,
        limit,
    }))
}

// ============================================================
// Candles
// ============================================================

pub async fn list_candle_tokens(State(state): State<Arc<AppState>>) -> ApiResult<CandleTokensResponse> {
    let view = state.candles.borrow().clone();
    let tokens = view
        .candles
        .iter()
        .filter_map(|(address, candles)| {
            let latest = candles.last()?;
            Some(TokenCandleEntry {
                token: latest.token.clone(),
                latest: Some(latest.clone()),
                summary: view
                    .summaries
                    .get(address)
                    .cloned()
                    .unwrap_or_else(|| candle_summary(candles)),
            })
        })
        .collect();

    Ok(Json(CandleTokensResponse { tokens }))
}

/// Look up by token address, falling back to symbol.
pub async fn candle_history(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<CandleHistoryResponse> {
    let view = state.candles.borrow().clone();
    let found = view.candles.get_key_value(&token).or_else(|| {
        view.candles.iter().find(|(_, candles)| {
            candles
                .last()
                .is_some_and(|c| c.token.symbol.eq_ignore_ascii_case(&token))
        })
    });

    let Some((address, candles)) = found else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No candles for token {}", token),
        ));
    };
    let Some(latest) = candles.last() else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No candles for token {}", token),
        ));
    };

    Ok(Json(CandleHistoryResponse {
        token: latest.token.clone(),
        candles: candles.clone(),
        summary: view
            .summaries
            .get(address)
            .cloned()
            .unwrap_or_else(|| candle_summary(candles)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::SharedFeed;
    use crate::config::Config;
    use crate::pipeline::{CandlePipeline, TransactionPipeline};
    use crate::stream::types::{test_candle, test_transaction};
    use chrono::Duration;

    struct Fixture {
        state: Arc<AppState>,
        tx_pipeline: TransactionPipeline,
        candle_pipeline: CandlePipeline,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let feed = SharedFeed::new(config.feed.capacity);
        let (tx_pipeline, transactions) = TransactionPipeline::new(&config, feed.clone());
        let (candle_pipeline, candles) = CandlePipeline::new(&config, feed.clone());
        Fixture {
            state: Arc::new(AppState {
                transactions,
                candles,
                feed,
            }),
            tx_pipeline,
            candle_pipeline,
        }
    }

    fn seed_transactions(fx: &mut Fixture) -> DateTime<Utc> {
        let now = Utc::now();
        let events = [
            test_transaction("SOL", 10, TxStatus::Success, now - Duration::minutes(3)),
            test_transaction("SOL", -2500, TxStatus::Success, now - Duration::minutes(2)),
            test_transaction("USDC", -50, TxStatus::Failed, now - Duration::minutes(1)),
        ];
        for tx in events {
            fx.tx_pipeline.process(tx, now).unwrap();
        }
        now
    }

    #[tokio::test]
    async fn test_transactions_newest_first_with_filters() {
        let mut fx = fixture();
        seed_transactions(&mut fx);

        let Json(all) = list_transactions(State(fx.state.clone()), Query(TransactionParams::default()))
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.transactions[0].token, "USDC");

        let params = TransactionParams {
            token: Some("sol".to_string()),
            min_amount: Some(100.0),
            ..Default::default()
        };
        let Json(filtered) = list_transactions(State(fx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.transactions[0].amount, BigDecimal::from(-2500));

        let params = TransactionParams {
            kind: Some("send".to_string()),
            limit: Some(1),
            ..Default::default()
        };
        let Json(limited) = list_transactions(State(fx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(limited.total, 2);
        assert_eq!(limited.transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_time_range() {
        let mut fx = fixture();
        let now = seed_transactions(&mut fx);

        let params = TransactionParams {
            since: Some((now - Duration::seconds(150)).to_rfc3339()),
            ..Default::default()
        };
        let Json(recent) = list_transactions(State(fx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(recent.total, 2);
    }

    #[tokio::test]
    async fn test_bad_filters_rejected() {
        let fx = fixture();
        let params = TransactionParams {
            status: Some("exploded".to_string()),
            ..Default::default()
        };
        let err = list_transactions(State(fx.state.clone()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let params = AnomalyParams {
            min_severity: Some("apocalyptic".to_string()),
            ..Default::default()
        };
        let err = list_anomalies(State(fx.state.clone()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_anomalies_filtered_by_severity() {
        let mut fx = fixture();
        seed_transactions(&mut fx);

        let Json(all) = list_anomalies(State(fx.state.clone()), Query(AnomalyParams::default()))
            .await
            .unwrap();
        // Large SOL send plus the failed USDC send.
        assert_eq!(all.total, 2);
        assert_eq!(all.anomalies[0].kind, AnomalyType::FailedTransaction);

        let params = AnomalyParams {
            min_severity: Some("CRITICAL".to_string()),
            ..Default::default()
        };
        let Json(critical) = list_anomalies(State(fx.state.clone()), Query(params))
            .await
            .unwrap();
        assert_eq!(critical.total, 1);
    }

    #[tokio::test]
    async fn test_summary_and_balances() {
        let mut fx = fixture();
        seed_transactions(&mut fx);

        let Json(body) = summary(State(fx.state.clone())).await.unwrap();
        assert_eq!(body.stats.total_transactions, 3);

        let Json(body) = balances(State(fx.state.clone())).await.unwrap();
        assert_eq!(body.balances.get("SOL"), Some(&BigDecimal::from(-2490)));
        assert_eq!(body.balances.get("USDC"), Some(&BigDecimal::from(-50)));
    }

    #[tokio::test]
    async fn test_candle_endpoints() {
        let mut fx = fixture();
        let candles = vec![test_candle("SOL", 1.0, 10.0), test_candle("SOL", 1.2, 10.0)];
        fx.candle_pipeline.process_candles(candles, Utc::now()).unwrap();

        let Json(tokens) = list_candle_tokens(State(fx.state.clone())).await.unwrap();
        assert_eq!(tokens.tokens.len(), 1);
        assert_eq!(tokens.tokens[0].summary.total_candles, 2);

        let Json(history) = candle_history(State(fx.state.clone()), Path("SOL".to_string()))
            .await
            .unwrap();
        assert_eq!(history.candles.len(), 2);

        let err = candle_history(State(fx.state.clone()), Path("BONK".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_reports_both_streams() {
        let mut fx = fixture();
        seed_transactions(&mut fx);
        fx.candle_pipeline.set_connected(true);

        let Json(body) = health(State(fx.state.clone())).await.unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.transactions.data_count, 3);
        assert!(body.candles.is_connected);
        assert_eq!(body.anomalies_published, 2);
    }
}
