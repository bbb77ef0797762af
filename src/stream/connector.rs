use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::raw::{CandleBatch, RawTransaction};

/// What a subscription can deliver. Connector-level failures travel as data
/// so they can be surfaced as status instead of unwinding the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent<T> {
    Data(T),
    Error(String),
    Completed,
}

/// A live subscription. Dropping the receiver or calling `unsubscribe` ends it.
pub struct Subscription<T> {
    pub events: mpsc::Receiver<ConnectorEvent<T>>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn new(events: mpsc::Receiver<ConnectorEvent<T>>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Upstream provider of wallet activity and OHLCV candles. Injected into the
/// monitor so several independent monitors can share or own connectors.
pub trait StreamConnector: Send + Sync {
    fn subscribe_wallet_activity(
        &self,
        wallet_address: &str,
    ) -> eyre::Result<Subscription<RawTransaction>>;

    fn subscribe_ohlcv(&self, token_addresses: &[String]) -> eyre::Result<Subscription<CandleBatch>>;

    /// Tear down every open subscription.
    fn disconnect(&self);
}

/// Producer half of a [`ChannelConnector`].
#[derive(Clone)]
pub struct ChannelFeeds {
    pub wallet: mpsc::Sender<ConnectorEvent<RawTransaction>>,
    pub ohlcv: mpsc::Sender<ConnectorEvent<CandleBatch>>,
}

/// In-process connector: whoever holds the [`ChannelFeeds`] plays the
/// upstream provider. Each stream can be subscribed once.
pub struct ChannelConnector {
    wallet: Mutex<Option<mpsc::Receiver<ConnectorEvent<RawTransaction>>>>,
    ohlcv: Mutex<Option<mpsc::Receiver<ConnectorEvent<CandleBatch>>>>,
    shutdown: CancellationToken,
}

impl ChannelConnector {
    pub fn new(buffer: usize) -> (Self, ChannelFeeds) {
        let (wallet_tx, wallet_rx) = mpsc::channel(buffer.max(1));
        let (ohlcv_tx, ohlcv_rx) = mpsc::channel(buffer.max(1));

        let connector = Self {
            wallet: Mutex::new(Some(wallet_rx)),
            ohlcv: Mutex::new(Some(ohlcv_rx)),
            shutdown: CancellationToken::new(),
        };
        let feeds = ChannelFeeds {
            wallet: wallet_tx,
            ohlcv: ohlcv_tx,
        };
        (connector, feeds)
    }
}

fn take_receiver<T>(
    slot: &Mutex<Option<mpsc::Receiver<T>>>,
    stream: &str,
) -> eyre::Result<mpsc::Receiver<T>> {
    slot.lock()
        .map_err(|_| eyre::eyre!("{} receiver lock poisoned", stream))?
        .take()
        .ok_or_else(|| eyre::eyre!("{} stream already subscribed", stream))
}

impl StreamConnector for ChannelConnector {
    fn subscribe_wallet_activity(
        &self,
        wallet_address: &str,
    ) -> eyre::Result<Subscription<RawTransaction>> {
        let events = take_receiver(&self.wallet, "wallet activity")?;
        tracing::info!(wallet = %wallet_address, "Subscribed to wallet activity channel");
        Ok(Subscription::new(events, self.shutdown.child_token()))
    }

    fn subscribe_ohlcv(&self, token_addresses: &[String]) -> eyre::Result<Subscription<CandleBatch>> {
        let events = take_receiver(&self.ohlcv, "OHLCV")?;
        tracing::info!(tokens = ?token_addresses, "Subscribed to OHLCV channel");
        Ok(Subscription::new(events, self.shutdown.child_token()))
    }

    fn disconnect(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_channel_delivers_in_order() {
        let (connector, feeds) = ChannelConnector::new(8);
        let mut sub = connector.subscribe_wallet_activity("wallet").unwrap();

        for i in 0..3 {
            feeds
                .wallet
                .send(ConnectorEvent::Data(RawTransaction(json!({ "tx_hash": i }))))
                .await
                .unwrap();
        }

        for i in 0..3 {
            match sub.events.recv().await {
                Some(ConnectorEvent::Data(raw)) => assert_eq!(raw.0["tx_hash"], json!(i)),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_second_subscription_rejected() {
        let (connector, _feeds) = ChannelConnector::new(8);
        assert!(connector.subscribe_ohlcv(&["t".to_string()]).is_ok());
        assert!(connector.subscribe_ohlcv(&["t".to_string()]).is_err());
    }

    #[test]
    fn test_disconnect_cancels_subscriptions() {
        let (connector, _feeds) = ChannelConnector::new(8);
        let sub = connector.subscribe_wallet_activity("wallet").unwrap();
        assert!(!sub.is_unsubscribed());
        connector.disconnect();
        assert!(sub.is_unsubscribed());
    }
}
