pub mod handlers;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::anomaly::SharedFeed;
use crate::monitor::MonitorHandles;
use crate::pipeline::{CandleView, TransactionView};

/// Read-only handles onto a running monitor.
#[derive(Clone)]
pub struct AppState {
    pub transactions: watch::Receiver<Arc<TransactionView>>,
    pub candles: watch::Receiver<Arc<CandleView>>,
    pub feed: SharedFeed,
}

impl AppState {
    pub fn from_handles(handles: &MonitorHandles) -> Self {
        Self {
            transactions: handles.transactions.clone(),
            candles: handles.candles.clone(),
            feed: handles.feed.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health))
        .route("/api/v1/transactions", get(handlers::list_transactions))
        .route("/api/v1/summary", get(handlers::summary))
        .route("/api/v1/balances", get(handlers::balances))
        .route("/api/v1/anomalies", get(handlers::list_anomalies))
        .route("/api/v1/candles", get(handlers::list_candle_tokens))
        .route("/api/v1/candles/{token}", get(handlers::candle_history))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> eyre::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
