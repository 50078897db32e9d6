use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use segora_types::events::GatewayEvent;
use segora_types::models::Listing;

/// What changed in a [`ListingStore`]. Views subscribe to these instead of
/// polling the snapshot.
#[derive(Debug, Clone)]
pub enum ListingChange {
    /// The whole list was replaced, e.g. after a filter change.
    Reset { count: usize },
    Updated(Listing),
    Removed(Uuid),
    FavoriteChanged { listing_id: Uuid, is_favorite: bool },
}

/// The listings currently shown to the user, shared between the feed, the
/// favorite toggle and the gateway listener.
#[derive(Clone)]
pub struct ListingStore {
    items: Arc<RwLock<Vec<Listing>>>,
    changes: broadcast::Sender<ListingChange>,
}

impl Default for ListingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ListingChange> {
        self.changes.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Listing> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Listing> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace(&self, listings: Vec<Listing>) {
        let count = listings.len();
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = listings;
        self.notify(ListingChange::Reset { count });
    }

    /// Refresh a listing in place. Listings not already shown are ignored so
    /// an edit elsewhere never sneaks past the active filters.
    pub fn upsert(&self, listing: Listing) -> bool {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = items.iter_mut().find(|l| l.id == listing.id) else {
            return false;
        };
        let is_favorite = slot.is_favorite;
        *slot = listing;
        // Broadcast copies carry no viewer state; keep ours.
        if slot.is_favorite.is_none() {
            slot.is_favorite = is_favorite;
        }
        let updated = slot.clone();
        drop(items);
        self.notify(ListingChange::Updated(updated));
        true
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|l| l.id != id);
        let removed = items.len() != before;
        drop(items);
        if removed {
            self.notify(ListingChange::Removed(id));
        }
        removed
    }

    pub fn set_favorite(&self, listing_id: Uuid, is_favorite: bool) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(listing) = items.iter_mut().find(|l| l.id == listing_id) {
            listing.is_favorite = Some(is_favorite);
        }
        drop(items);
        self.notify(ListingChange::FavoriteChanged {
            listing_id,
            is_favorite,
        });
    }

    /// Fold a gateway event into the store. Returns true if anything changed.
    pub fn apply_event(&self, event: &GatewayEvent) -> bool {
        match event {
            GatewayEvent::ListingDeleted { listing_id, .. } => {
                debug!("Listing {} deleted upstream", listing_id);
                self.remove(*listing_id)
            }
            GatewayEvent::ListingUpdated { listing } => self.upsert(listing.clone()),
            _ => false,
        }
    }

    fn notify(&self, change: ListingChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use segora_types::models::OfferKind;

    pub(crate) fn listing(title: &str, price: i64) -> Listing {
        Listing {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            price,
            image_url: None,
            category_id: Uuid::new_v4(),
            category_name: None,
            seller_id: Uuid::new_v4(),
            seller_name: "Sari".into(),
            seller_avatar: None,
            seller_major: None,
            campus: Some("UI Depok".into()),
            offer_kind: OfferKind::Product,
            rating: None,
            views: 0,
            created_at: Utc::now(),
            is_favorite: None,
        }
    }

    #[tokio::test]
    async fn deleted_event_drops_listing_and_notifies() {
        let store = ListingStore::new();
        let keep = listing("Kalkulator", 50_000);
        let gone = listing("Jas lab", 75_000);
        store.replace(vec![keep.clone(), gone.clone()]);
        let mut rx = store.subscribe();

        let event = GatewayEvent::ListingDeleted {
            listing_id: gone.id,
            seller_id: gone.seller_id,
        };
        assert!(store.apply_event(&event));
        assert!(!store.apply_event(&event));

        let ids: Vec<Uuid> = store.snapshot().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![keep.id]);
        assert!(matches!(rx.recv().await.unwrap(), ListingChange::Removed(id) if id == gone.id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn update_keeps_viewer_favorite_state() {
        let store = ListingStore::new();
        let mut shown = listing("Buku kalkulus", 40_000);
        shown.is_favorite = Some(true);
        store.replace(vec![shown.clone()]);

        let mut edited = shown.clone();
        edited.price = 35_000;
        edited.is_favorite = None;
        assert!(store.apply_event(&GatewayEvent::ListingUpdated { listing: edited }));

        let now = store.get(shown.id).unwrap();
        assert_eq!(now.price, 35_000);
        assert_eq!(now.is_favorite, Some(true));
    }

    #[test]
    fn updates_for_unknown_listings_are_ignored() {
        let store = ListingStore::new();
        store.replace(vec![listing("Kalkulator", 50_000)]);
        assert!(!store.upsert(listing("Sepeda", 900_000)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn other_events_leave_store_alone() {
        let store = ListingStore::new();
        store.replace(vec![listing("Kalkulator", 50_000)]);
        let ready = GatewayEvent::Ready {
            user_id: Uuid::new_v4(),
        };
        assert!(!store.apply_event(&ready));
        assert_eq!(store.len(), 1);
    }
}
