//! Client side of the gateway: a WebSocket that turns server pushes into
//! typed events and keeps the [`ListingStore`] in step with them.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use segora_types::events::{GatewayCommand, GatewayEvent};

use crate::error::ClientError;
use crate::store::ListingStore;

const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans gateway events out to typed subscribers. A subscription ends when
/// its receiver is dropped.
#[derive(Clone)]
pub struct GatewayListener {
    events: broadcast::Sender<GatewayEvent>,
    store: ListingStore,
}

impl GatewayListener {
    pub fn new(store: ListingStore) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { events, store }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Apply `event` to the listing store, then hand it to subscribers.
    pub fn dispatch(&self, event: GatewayEvent) {
        self.store.apply_event(&event);
        let _ = self.events.send(event);
    }

    /// Open the gateway socket, identify with `token` and wait for `Ready`.
    /// The returned task reads events until the server hangs up.
    pub async fn connect(
        &self,
        base_url: &str,
        token: &str,
    ) -> Result<JoinHandle<()>, ClientError> {
        let ws_url = format!(
            "{}/gateway",
            base_url.replace("http://", "ws://").replace("https://", "wss://")
        );
        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .map_err(|e| ClientError::Gateway(format!("connect failed: {}", e)))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let identify = serde_json::to_string(&GatewayCommand::Identify {
            token: token.to_string(),
        })?;
        ws_tx
            .send(Message::Text(identify.into()))
            .await
            .map_err(|e| ClientError::Gateway(format!("send failed: {}", e)))?;

        let wait_ready = async {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Ok(GatewayEvent::Ready { user_id }) = serde_json::from_str(text.as_str()) {
                            return Ok(user_id);
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => return Err(ClientError::Gateway(e.to_string())),
                }
            }
            Err(ClientError::Gateway("connection closed before Ready".into()))
        };
        let user_id = tokio::time::timeout(READY_TIMEOUT, wait_ready)
            .await
            .map_err(|_| ClientError::Gateway("timed out waiting for Ready".into()))??;
        info!("Gateway ready for {}", user_id);

        let listener = self.clone();
        let handle = tokio::spawn(async move {
            // Keep the sink alive so the socket is not half-closed.
            let _ws_tx = ws_tx;
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<GatewayEvent>(text.as_str()) {
                        Ok(event) => listener.dispatch(event),
                        Err(e) => warn!("Unrecognized gateway event: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Gateway read error: {}", e);
                        break;
                    }
                }
            }
            debug!("Gateway connection closed");
        });
        Ok(handle)
    }
}
