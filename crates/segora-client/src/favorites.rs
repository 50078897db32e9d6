use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::error::ClientError;
use crate::store::ListingStore;

/// Backing store for favorites. Adding twice and removing an absent
/// favorite are both no-ops.
#[async_trait]
pub trait FavoriteStore: Send + Sync {
    async fn add_favorite(&self, listing_id: Uuid) -> Result<(), ClientError>;
    async fn remove_favorite(&self, listing_id: Uuid) -> Result<(), ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    LoginRequired,
    Toggled { listing_id: Uuid, is_favorite: bool },
}

/// The heart button. Tracks the viewer's favorites locally and writes each
/// flip through to the store.
pub struct FavoriteToggle {
    store: Arc<dyn FavoriteStore>,
    user: Option<Uuid>,
    // Held across the store call so two taps on one listing apply in order.
    members: Mutex<HashSet<Uuid>>,
    listings: Option<ListingStore>,
}

impl FavoriteToggle {
    pub fn new(store: Arc<dyn FavoriteStore>, user: Option<Uuid>) -> Self {
        Self {
            store,
            user,
            members: Mutex::new(HashSet::new()),
            listings: None,
        }
    }

    /// Mirror every flip into `listings` so open views update their hearts.
    pub fn with_listings(mut self, listings: ListingStore) -> Self {
        self.listings = Some(listings);
        self
    }

    /// Load the favorites the store already knows about.
    pub async fn seed(&self, ids: impl IntoIterator<Item = Uuid>) {
        self.members.lock().await.extend(ids);
    }

    pub async fn is_favorite(&self, listing_id: Uuid) -> bool {
        self.members.lock().await.contains(&listing_id)
    }

    /// Flip the favorite state of `listing_id`. On failure the local state is
    /// left as it was.
    pub async fn toggle(&self, listing_id: Uuid) -> Result<ToggleOutcome, ClientError> {
        if self.user.is_none() {
            return Ok(ToggleOutcome::LoginRequired);
        }

        let mut members = self.members.lock().await;
        let was_favorite = members.contains(&listing_id);
        let result = if was_favorite {
            self.store.remove_favorite(listing_id).await
        } else {
            self.store.add_favorite(listing_id).await
        };

        match result {
            Ok(()) => {}
            Err(ClientError::LoginRequired) => return Ok(ToggleOutcome::LoginRequired),
            Err(e) => {
                warn!("Failed to toggle favorite {}: {}", listing_id, e);
                return Err(e);
            }
        }

        let is_favorite = !was_favorite;
        if is_favorite {
            members.insert(listing_id);
        } else {
            members.remove(&listing_id);
        }
        drop(members);

        if let Some(listings) = &self.listings {
            listings.set_favorite(listing_id, is_favorite);
        }
        Ok(ToggleOutcome::Toggled {
            listing_id,
            is_favorite,
        })
    }
}
