use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::anomaly::SharedFeed;
use crate::config::Config;
use crate::pipeline::{CandlePipeline, CandleView, ProcessResult, TransactionPipeline, TransactionView};
use crate::stream::connector::{ConnectorEvent, StreamConnector, Subscription};
use crate::stream::normalize::normalize_transaction;
use crate::stream::raw::{CandleBatch, RawTransaction};

/// Everything a consumer needs from a running monitor.
pub struct MonitorHandles {
    pub transactions: watch::Receiver<Arc<TransactionView>>,
    pub candles: watch::Receiver<Arc<CandleView>>,
    pub feed: SharedFeed,
    pub tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandles {
    /// Wait for both stream tasks to finish.
    pub async fn join(self) {
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Stream task panicked");
            }
        }
    }
}

/// Subscribe both streams and spawn one task per stream. Each task owns its
/// pipeline; the only state they share is the anomaly feed.
pub fn spawn_monitor(
    connector: Arc<dyn StreamConnector>,
    config: &Config,
    shutdown: CancellationToken,
) -> eyre::Result<MonitorHandles> {
    let feed = SharedFeed::new(config.feed.capacity);

    let wallet_sub = connector.subscribe_wallet_activity(&config.source.wallet_address)?;
    let ohlcv_sub = match connector.subscribe_ohlcv(&config.source.tokens) {
        Ok(sub) => sub,
        Err(e) => {
            wallet_sub.unsubscribe();
            return Err(e);
        }
    };

    let (tx_pipeline, transactions) = TransactionPipeline::new(config, feed.clone());
    let (candle_pipeline, candles) = CandlePipeline::new(config, feed.clone());

    let tasks = vec![
        tokio::spawn(run_stream(wallet_sub, tx_pipeline, shutdown.clone())),
        tokio::spawn(run_stream(ohlcv_sub, candle_pipeline, shutdown)),
    ];

    tracing::info!(
        wallet = %config.source.wallet_address,
        tokens = config.source.tokens.len(),
        "Monitor started"
    );

    Ok(MonitorHandles {
        transactions,
        candles,
        feed,
        tasks,
    })
}

/// Consumer side of one stream.
trait StreamSink<T>: Send {
    const NAME: &'static str;

    fn on_data(&mut self, item: T, now: DateTime<Utc>) -> eyre::Result<ProcessResult>;
    fn set_connected(&mut self, connected: bool);
    fn record_error(&mut self, error: String);
}

impl StreamSink<RawTransaction> for TransactionPipeline {
    const NAME: &'static str = "wallet";

    fn on_data(&mut self, item: RawTransaction, now: DateTime<Utc>) -> eyre::Result<ProcessResult> {
        self.process(normalize_transaction(&item, now), now)
    }

    fn set_connected(&mut self, connected: bool) {
        TransactionPipeline::set_connected(self, connected);
    }

    fn record_error(&mut self, error: String) {
        TransactionPipeline::record_error(self, error);
    }
}

impl StreamSink<CandleBatch> for CandlePipeline {
    const NAME: &'static str = "ohlcv";

    fn on_data(&mut self, item: CandleBatch, now: DateTime<Utc>) -> eyre::Result<ProcessResult> {
        self.process_batch(&item, now)
    }

    fn set_connected(&mut self, connected: bool) {
        CandlePipeline::set_connected(self, connected);
    }

    fn record_error(&mut self, error: String) {
        CandlePipeline::record_error(self, error);
    }
}

/// Drain one subscription in arrival order until shutdown, unsubscribe or
/// end of stream. Connector errors are recorded and the loop keeps going.
async fn run_stream<T, S>(mut subscription: Subscription<T>, mut sink: S, shutdown: CancellationToken)
where
    T: Send + 'static,
    S: StreamSink<T>,
{
    let stream = <S as StreamSink<T>>::NAME;
    let unsubscribed = subscription.cancellation().clone();
    sink.set_connected(true);
    tracing::info!(stream, "Stream runner started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(stream, "Shutdown received, unsubscribing");
                subscription.unsubscribe();
                break;
            }
            _ = unsubscribed.cancelled() => {
                tracing::info!(stream, "Subscription cancelled");
                break;
            }
            event = subscription.events.recv() => match event {
                Some(ConnectorEvent::Data(item)) => {
                    if let Err(e) = sink.on_data(item, Utc::now()) {
                        tracing::error!(stream, error = %e, "Failed to process event");
                    }
                }
                Some(ConnectorEvent::Error(message)) => {
                    tracing::warn!(stream, error = %message, "Connector error");
                    sink.record_error(message);
                }
                Some(ConnectorEvent::Completed) | None => {
                    tracing::info!(stream, "Stream completed");
                    break;
                }
            }
        }
    }

    sink.set_connected(false);
    tracing::info!(stream, "Stream runner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyType, Severity};
    use crate::stream::connector::ChannelConnector;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> Config {
        let mut config = Config::default();
        config.source.wallet_address = "wallet".to_string();
        config.source.tokens = vec!["SOL".to_string()];
        config
    }

    fn candle_batch(close: f64) -> ConnectorEvent<CandleBatch> {
        ConnectorEvent::Data(CandleBatch::from_payload(
            "SOL",
            json!({ "open": close, "high": close, "low": close, "close": close, "volume": 100.0 }),
        ))
    }

    #[tokio::test]
    async fn test_candle_stream_end_to_end() {
        let (connector, feeds) = ChannelConnector::new(16);
        let handles = spawn_monitor(Arc::new(connector), &config(), CancellationToken::new()).unwrap();

        for close in [1.0, 1.0, 1.0, 1.5] {
            feeds.ohlcv.send(candle_batch(close)).await.unwrap();
        }
        feeds.ohlcv.send(ConnectorEvent::Completed).await.unwrap();
        feeds.wallet.send(ConnectorEvent::Completed).await.unwrap();

        let candles = handles.candles.clone();
        let feed = handles.feed.clone();
        handles.join().await;

        let view = candles.borrow().clone();
        assert_eq!(view.candles["SOL"].len(), 4);
        assert_eq!(view.health.data_count, 4);
        assert!(!view.health.is_connected);

        let anomalies = feed.snapshot().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyType::PriceSpike);
        assert_eq!(anomalies[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_transaction_stream_records_connector_errors() {
        let (connector, feeds) = ChannelConnector::new(16);
        let handles = spawn_monitor(Arc::new(connector), &config(), CancellationToken::new()).unwrap();

        feeds
            .wallet
            .send(ConnectorEvent::Error("upstream hiccup".to_string()))
            .await
            .unwrap();
        feeds
            .wallet
            .send(ConnectorEvent::Data(RawTransaction(json!({
                "tx_hash": "abc",
                "tx_type": "send",
                "token_symbol": "SOL",
                "value_change": "-5000",
                "status": "failed"
            }))))
            .await
            .unwrap();
        feeds.wallet.send(ConnectorEvent::Completed).await.unwrap();
        feeds.ohlcv.send(ConnectorEvent::Completed).await.unwrap();

        let transactions = handles.transactions.clone();
        let feed = handles.feed.clone();
        handles.join().await;

        let view = transactions.borrow().clone();
        assert_eq!(view.transactions.len(), 1);
        assert_eq!(view.health.last_error.as_deref(), Some("upstream hiccup"));
        assert_eq!(view.health.data_count, 1);
        assert_eq!(feed.snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_runners() {
        let (connector, _feeds) = ChannelConnector::new(4);
        let shutdown = CancellationToken::new();
        let handles = spawn_monitor(Arc::new(connector), &config(), shutdown.clone()).unwrap();

        let transactions = handles.transactions.clone();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handles.join())
            .await
            .unwrap();
        assert!(!transactions.borrow().health.is_connected);
    }

    #[tokio::test]
    async fn test_disconnect_ends_streams() {
        let (connector, _feeds) = ChannelConnector::new(4);
        let connector = Arc::new(connector);
        let handles = spawn_monitor(connector.clone(), &config(), CancellationToken::new()).unwrap();

        connector.disconnect();
        tokio::time::timeout(Duration::from_secs(5), handles.join())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_subscription_fails() {
        let (connector, _feeds) = ChannelConnector::new(4);
        let connector: Arc<dyn StreamConnector> = Arc::new(connector);
        let _first = spawn_monitor(connector.clone(), &config(), CancellationToken::new()).unwrap();
        assert!(spawn_monitor(connector, &config(), CancellationToken::new()).is_err());
    }
}
