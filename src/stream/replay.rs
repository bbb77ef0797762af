use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::connector::{ConnectorEvent, StreamConnector, Subscription};
use super::raw::{CandleBatch, RawTransaction};

/// Connector that replays JSON-lines capture files, one payload per line.
/// Lines that fail to parse are reported as connector errors and skipped.
pub struct ReplayConnector {
    transactions_path: Option<String>,
    candles_path: Option<String>,
    delay: Duration,
    buffer: usize,
    shutdown: CancellationToken,
}

impl ReplayConnector {
    pub fn new(
        transactions_path: Option<String>,
        candles_path: Option<String>,
        delay: Duration,
        buffer: usize,
    ) -> Self {
        Self {
            transactions_path,
            candles_path,
            delay,
            buffer: buffer.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    fn spawn_replay<T, F>(&self, path: Option<String>, parse: F) -> Subscription<T>
    where
        T: Send + 'static,
        F: Fn(JsonValue) -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.buffer);
        let cancel = self.shutdown.child_token();
        let delay = self.delay;
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            let Some(path) = path else {
                // Nothing to replay; the stream stays open and idle until cancelled.
                task_cancel.cancelled().await;
                return;
            };
            tokio::select! {
                _ = task_cancel.cancelled() => {}
                _ = replay_file(&path, &tx, delay, parse) => {}
            }
        });

        Subscription::new(rx, cancel)
    }
}

async fn replay_file<T, F>(
    path: &str,
    tx: &mpsc::Sender<ConnectorEvent<T>>,
    delay: Duration,
    parse: F,
) where
    F: Fn(JsonValue) -> T,
{
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            let _ = tx
                .send(ConnectorEvent::Error(format!("Failed to open '{}': {}", path, e)))
                .await;
            return;
        }
    };

    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0usize;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                let _ = tx
                    .send(ConnectorEvent::Error(format!("Read error in '{}': {}", path, e)))
                    .await;
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<JsonValue>(&line) {
            Ok(value) => ConnectorEvent::Data(parse(value)),
            Err(e) => ConnectorEvent::Error(format!("{}:{}: {}", path, line_no, e)),
        };
        if tx.send(event).await.is_err() {
            return;
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::info!(path, lines = line_no, "Replay file exhausted");
    let _ = tx.send(ConnectorEvent::Completed).await;
}

impl StreamConnector for ReplayConnector {
    fn subscribe_wallet_activity(
        &self,
        wallet_address: &str,
    ) -> eyre::Result<Subscription<RawTransaction>> {
        tracing::info!(
            wallet = %wallet_address,
            path = ?self.transactions_path,
            "Replaying wallet activity"
        );
        Ok(self.spawn_replay(self.transactions_path.clone(), RawTransaction))
    }

    fn subscribe_ohlcv(&self, token_addresses: &[String]) -> eyre::Result<Subscription<CandleBatch>> {
        if self.candles_path.is_some() && token_addresses.is_empty() {
            return Err(eyre::eyre!("OHLCV replay requires at least one token address"));
        }
        let subscribed = token_addresses.first().cloned().unwrap_or_default();
        tracing::info!(tokens = ?token_addresses, path = ?self.candles_path, "Replaying OHLCV candles");
        Ok(self.spawn_replay(self.candles_path.clone(), move |payload| {
            CandleBatch::from_payload(subscribed.clone(), payload)
        }))
    }

    fn disconnect(&self) {
        self.shutdown.cancel();
    }
}
