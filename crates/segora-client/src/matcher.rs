//! The "contact seller" flow: open the conversation between the current user
//! and a listing's seller, reusing an existing one when it exists.

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use segora_types::api::OpenConversationResponse;
use segora_types::models::Listing;

use crate::error::ClientError;

/// Where conversations live. The service performs the find-or-create
/// atomically; implementations only forward the request.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn open_conversation(
        &self,
        listing_id: Uuid,
    ) -> Result<OpenConversationResponse, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactOutcome {
    /// Nobody is signed in; the caller should route to the login screen.
    LoginRequired,
    /// The conversation to navigate to.
    Opened { chat_id: Uuid, created: bool },
}

/// Open (or reuse) the conversation about `listing` between `current_user`
/// and the listing's seller.
///
/// Contacting yourself is rejected before the store is touched. Store errors
/// are returned as-is and never retried.
pub async fn open_conversation(
    store: &dyn ConversationStore,
    current_user: Option<Uuid>,
    listing: &Listing,
) -> Result<ContactOutcome, ClientError> {
    let Some(user_id) = current_user else {
        return Ok(ContactOutcome::LoginRequired);
    };
    if listing.seller_id == user_id {
        return Err(ClientError::Validation("cannot message yourself".into()));
    }

    match store.open_conversation(listing.id).await {
        Ok(res) => {
            debug!(
                "Conversation {} for listing {} ({})",
                res.chat_id,
                listing.id,
                if res.created { "new" } else { "existing" }
            );
            Ok(ContactOutcome::Opened {
                chat_id: res.chat_id,
                created: res.created,
            })
        }
        // Token expired between screens.
        Err(ClientError::LoginRequired) => Ok(ContactOutcome::LoginRequired),
        Err(e) => {
            warn!("Failed to open conversation for listing {}: {}", listing.id, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::store::tests::listing;

    /// Find-or-create keyed by listing, the way the service does it.
    #[derive(Default)]
    struct MockStore {
        calls: AtomicUsize,
        chats: Mutex<HashMap<Uuid, Uuid>>,
        fail_with: Option<u16>,
    }

    #[async_trait]
    impl ConversationStore for MockStore {
        async fn open_conversation(
            &self,
            listing_id: Uuid,
        ) -> Result<OpenConversationResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_with {
                return Err(ClientError::from_status(status, "unavailable".into()));
            }
            let mut chats = self.chats.lock().unwrap();
            let created = !chats.contains_key(&listing_id);
            let chat_id = *chats.entry(listing_id).or_insert_with(Uuid::new_v4);
            Ok(OpenConversationResponse { chat_id, created })
        }
    }

    #[tokio::test]
    async fn second_contact_reuses_the_conversation() {
        let store = MockStore::default();
        let item = listing("Kalkulator", 50_000);
        let buyer = Some(Uuid::new_v4());

        let first = open_conversation(&store, buyer, &item).await.unwrap();
        let second = open_conversation(&store, buyer, &item).await.unwrap();

        let ContactOutcome::Opened { chat_id: a, created: true } = first else {
            panic!("first contact should create, got {:?}", first);
        };
        assert_eq!(second, ContactOutcome::Opened { chat_id: a, created: false });
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn signed_out_user_is_sent_to_login_without_store_access() {
        let store = MockStore::default();
        let item = listing("Kalkulator", 50_000);

        let outcome = open_conversation(&store, None, &item).await.unwrap();
        assert_eq!(outcome, ContactOutcome::LoginRequired);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn contacting_yourself_never_reaches_the_store() {
        let store = MockStore::default();
        let item = listing("Kalkulator", 50_000);

        let err = open_conversation(&store, Some(item.seller_id), &item)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(m) if m == "cannot message yourself"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_session_maps_to_login_required() {
        let store = MockStore {
            fail_with: Some(401),
            ..Default::default()
        };
        let item = listing("Kalkulator", 50_000);
        let outcome = open_conversation(&store, Some(Uuid::new_v4()), &item)
            .await
            .unwrap();
        assert_eq!(outcome, ContactOutcome::LoginRequired);
    }

    #[tokio::test]
    async fn store_failure_is_surfaced_once() {
        let store = MockStore {
            fail_with: Some(503),
            ..Default::default()
        };
        let item = listing("Kalkulator", 50_000);
        let err = open_conversation(&store, Some(Uuid::new_v4()), &item)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 503, .. }));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
