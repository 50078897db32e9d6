use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use segora_types::events::GatewayEvent;

type UserSender = mpsc::UnboundedSender<GatewayEvent>;

/// Fans gateway events out to connected clients.
///
/// Marketplace-wide events (a listing was edited or removed) go over one
/// broadcast channel every connection subscribes to. Events that concern
/// specific users (a new conversation, a new message) go over per-connection
/// channels keyed by user id, so a user signed in on two devices gets both.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// user_id -> [(conn_id, sender)]
    user_channels: RwLock<HashMap<Uuid, Vec<(Uuid, UserSender)>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to marketplace-wide events.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Send an event to every subscriber. Returns how many received it.
    pub fn broadcast(&self, event: GatewayEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }

    /// Register a targeted channel for one connection. Returns (conn_id, receiver).
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push((conn_id, tx));
        (conn_id, rx)
    }

    /// Drop the channel registered under `conn_id`. Other connections of the
    /// same user stay registered.
    pub async fn unregister_user_channel(&self, user_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.user_channels.write().await;
        if let Some(conns) = channels.get_mut(&user_id) {
            conns.retain(|(id, _)| *id != conn_id);
            if conns.is_empty() {
                channels.remove(&user_id);
            }
        }
    }

    /// Send an event to every connection of one user. Returns how many
    /// connections received it.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> usize {
        self.send_to_users(&[user_id], event).await
    }

    /// Send an event to every connection of each listed user.
    /// Duplicate ids are delivered once.
    pub async fn send_to_users(&self, user_ids: &[Uuid], event: GatewayEvent) -> usize {
        let channels = self.inner.user_channels.read().await;
        let mut delivered = 0usize;
        for (i, user_id) in user_ids.iter().enumerate() {
            if user_ids[..i].contains(user_id) {
                continue;
            }
            if let Some(conns) = channels.get(user_id) {
                for (_, tx) in conns {
                    if tx.send(event.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }
        debug!("Targeted event delivered to {} connections", delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use segora_types::models::Message;

    fn message_event(chat_id: Uuid, sender_id: Uuid) -> GatewayEvent {
        GatewayEvent::MessageCreate {
            message: Message {
                id: Uuid::new_v4(),
                chat_id,
                sender_id,
                content: "Masih ada?".into(),
                is_read: false,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        let listing_id = Uuid::new_v4();
        let sent = dispatcher.broadcast(GatewayEvent::ListingDeleted {
            listing_id,
            seller_id: Uuid::new_v4(),
        });
        assert_eq!(sent, 2);

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                GatewayEvent::ListingDeleted { listing_id: got, .. } => assert_eq!(got, listing_id),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_not_an_error() {
        let dispatcher = Dispatcher::new();
        let sent = dispatcher.broadcast(GatewayEvent::ListingDeleted {
            listing_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
        });
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn targeted_events_only_reach_the_listed_users() {
        let dispatcher = Dispatcher::new();
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let bystander = Uuid::new_v4();

        let (_, mut buyer_rx) = dispatcher.register_user_channel(buyer).await;
        let (_, mut seller_rx) = dispatcher.register_user_channel(seller).await;
        let (_, mut bystander_rx) = dispatcher.register_user_channel(bystander).await;

        let delivered = dispatcher
            .send_to_users(&[buyer, seller, buyer], message_event(Uuid::new_v4(), buyer))
            .await;
        assert_eq!(delivered, 2);

        assert!(matches!(buyer_rx.try_recv(), Ok(GatewayEvent::MessageCreate { .. })));
        assert!(buyer_rx.try_recv().is_err());
        assert!(matches!(seller_rx.try_recv(), Ok(GatewayEvent::MessageCreate { .. })));
        assert!(bystander_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_connection_of_a_user_receives_targeted_events() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, mut phone) = dispatcher.register_user_channel(user).await;
        let (_, mut laptop) = dispatcher.register_user_channel(user).await;

        let delivered = dispatcher
            .send_to_user(user, message_event(Uuid::new_v4(), Uuid::new_v4()))
            .await;
        assert_eq!(delivered, 2);

        assert!(phone.try_recv().is_ok());
        assert!(laptop.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unregister_only_removes_that_connection() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, _first_rx) = dispatcher.register_user_channel(user).await;
        let (second, _second_rx) = dispatcher.register_user_channel(user).await;
        let ping = || message_event(Uuid::new_v4(), Uuid::new_v4());

        dispatcher.unregister_user_channel(user, first).await;
        assert_eq!(dispatcher.send_to_user(user, ping()).await, 1);

        dispatcher.unregister_user_channel(user, Uuid::new_v4()).await;
        assert_eq!(dispatcher.send_to_user(user, ping()).await, 1);

        dispatcher.unregister_user_channel(user, second).await;
        assert_eq!(dispatcher.send_to_user(user, ping()).await, 0);
    }
}
