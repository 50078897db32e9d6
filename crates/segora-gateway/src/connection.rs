use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use segora_types::api::Claims;
use segora_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Server pings every 15 seconds; two missed pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket has to send `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve one gateway WebSocket: wait for `Identify`, answer `Ready`, then
/// forward marketplace-wide and targeted events until either side hangs up.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let Some(user_id) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("Gateway client failed to identify, closing");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    info!("{} connected to gateway", user_id);

    // Subscribe before Ready so nothing published after Ready is missed.
    let (conn_id, user_rx) = dispatcher.register_user_channel(user_id).await;
    let broadcast_rx = dispatcher.subscribe();

    let ready_sent = match encode(&GatewayEvent::Ready { user_id }) {
        Some(ready) => sender.send(ready).await.is_ok(),
        None => false,
    };
    if ready_sent {
        run_connection_loop(sender, receiver, user_id, user_rx, broadcast_rx).await;
    }

    dispatcher.unregister_user_channel(user_id, conn_id).await;
    info!("{} disconnected from gateway", user_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    user_id: Uuid,
    mut user_rx: mpsc::UnboundedReceiver<GatewayEvent>,
    mut broadcast_rx: broadcast::Receiver<GatewayEvent>,
) {
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            let event = tokio::select! {
                result = broadcast_rx.recv() => match result {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Broadcast receiver lagged by {} events", n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                result = user_rx.recv() => match result {
                    Some(event) => event,
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout for {}, dropping connection", user_id);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let Some(frame) = encode(&event) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Identify { .. }) => {
                        debug!("{} sent Identify twice, ignoring", user_id);
                    }
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<Uuid> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return verify_token(&token, jwt_secret);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

/// Validate a session token and return its user id.
pub fn verify_token(token: &str, jwt_secret: &str) -> Option<Uuid> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims.sub)
    .ok()
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            None
        }
    }
}
